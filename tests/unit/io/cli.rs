//! Tests for command-line parsing and running each subcommand against files

#[cfg(test)]
mod tests {
    use clap::Parser;
    use ndarray::Array3;
    use shatterstack::io::cli::{Cli, Command, CommandRunner};
    use shatterstack::io::configuration::{
        DEFAULT_BACKGROUND, DEFAULT_CACHE_DIR, DEFAULT_FRAGMENT_PIECES, DEFAULT_NUM_OUTPUTS,
        DEFAULT_NUM_PIECES, DEFAULT_SEED, DEFAULT_SIGMA_LADDER,
    };
    use shatterstack::io::image::{load_image, save_image};
    use std::path::{Path, PathBuf};
    use tempfile::TempDir;

    fn write_target(dir: &Path) -> PathBuf {
        let path = dir.join("target.png");
        let image = Array3::from_shape_fn((6, 8, 3), |(r, c, ch)| {
            0.2 + 0.6 * ((r + c + ch) % 4) as f32 / 3.0
        });
        save_image(&image, &path).unwrap();
        path
    }

    fn run(args: &[&str]) {
        let cli = Cli::parse_from(args);
        CommandRunner::new(cli).run().unwrap();
    }

    // Tests shatter defaults come from the configuration constants
    // Verified by changing a default value
    #[test]
    fn test_shatter_defaults() {
        let cli = Cli::parse_from(["shatterstack", "shatter", "img.png"]);

        let Command::Shatter(args) = cli.command else {
            panic!("expected shatter");
        };
        assert_eq!(args.target, PathBuf::from("img.png"));
        assert_eq!(args.pieces, DEFAULT_NUM_PIECES);
        assert_eq!(args.images, DEFAULT_NUM_OUTPUTS);
        assert_eq!(args.seed, DEFAULT_SEED);
        assert_eq!(args.background, DEFAULT_BACKGROUND);
        assert!(!args.random);
        assert_eq!(cli.cache_dir, PathBuf::from(DEFAULT_CACHE_DIR));
    }

    // Tests converge takes any number of canvases and a two-value range
    // Verified by limiting canvases to one value
    #[test]
    fn test_converge_args() {
        let cli = Cli::parse_from([
            "shatterstack",
            "converge",
            "t.png",
            "a.png",
            "b.png",
            "--target-range",
            "0.1",
            "0.9",
            "--clip",
        ]);

        let Command::Converge(args) = cli.command else {
            panic!("expected converge");
        };
        assert_eq!(args.canvases.len(), 2);
        assert_eq!(args.target_range, Some(vec![0.1, 0.9]));
        assert_eq!(args.pieces, DEFAULT_FRAGMENT_PIECES);
        assert!(args.clip);
    }

    // Tests sigmas parse as a comma-separated list
    // Verified by removing the value delimiter
    #[test]
    fn test_pyramid_sigmas() {
        let cli = Cli::parse_from(["shatterstack", "pyramid", "t.png", "--sigmas", "4,1,0"]);
        let Command::Pyramid(args) = cli.command else {
            panic!("expected pyramid");
        };
        assert_eq!(args.sigmas, vec![4.0, 1.0, 0.0]);

        let defaults = Cli::parse_from(["shatterstack", "pyramid", "t.png"]);
        let Command::Pyramid(args) = defaults.command else {
            panic!("expected pyramid");
        };
        assert_eq!(args.sigmas, DEFAULT_SIGMA_LADDER.to_vec());
    }

    // Tests a lone width or height implies a square
    // Verified by leaving the other side unset
    #[test]
    fn test_bounds() {
        let both = Cli::parse_from(["p", "shatter", "t.png", "-w", "30", "-H", "20"]);
        assert_eq!(both.bounds(), Some((20, 30)));
        let width = Cli::parse_from(["p", "shatter", "t.png", "-w", "30"]);
        assert_eq!(width.bounds(), Some((30, 30)));
        let none = Cli::parse_from(["p", "shatter", "t.png"]);
        assert_eq!(none.bounds(), None);
    }

    // Tests quiet and verbose flags select the log level
    // Verified by letting verbose override quiet
    #[test]
    fn test_log_level() {
        assert_eq!(Cli::parse_from(["p", "shatter", "t"]).log_level(), "info");
        assert_eq!(Cli::parse_from(["p", "shatter", "t", "-v"]).log_level(), "debug");
        assert_eq!(Cli::parse_from(["p", "shatter", "t", "-vv"]).log_level(), "trace");
        let quiet = Cli::parse_from(["p", "shatter", "t", "-q", "-v"]);
        assert_eq!(quiet.log_level(), "warn");
        assert!(!quiet.should_show_progress());
    }

    // Tests shatter writes one shard per output image through the cache
    // Verified by skipping the shard export
    #[test]
    fn test_run_shatter() {
        let dir = TempDir::new().unwrap();
        let target = write_target(dir.path());
        let cache = dir.path().join("cache");
        let out = dir.path().join("out");

        run(&[
            "shatterstack",
            "shatter",
            target.to_str().unwrap(),
            "-n",
            "5",
            "-i",
            "3",
            "-q",
            "--cache-dir",
            cache.to_str().unwrap(),
            "-o",
            out.to_str().unwrap(),
        ]);

        for index in 0..3 {
            let shard = out.join(format!("target_shard_{index:02}.png"));
            assert_eq!(load_image(&shard).unwrap().dim(), (6, 8, 3));
        }
        assert_eq!(std::fs::read_dir(&cache).unwrap().count(), 1);
    }

    // Tests converge writes every canvas plus their product
    // Verified by saving only the combined image
    #[test]
    fn test_run_converge() {
        let dir = TempDir::new().unwrap();
        let target = write_target(dir.path());
        let out = dir.path().join("out");

        run(&[
            "shatterstack",
            "converge",
            target.to_str().unwrap(),
            "-c",
            "2",
            "-n",
            "6",
            "-i",
            "3",
            "-q",
            "--no-cache",
            "-o",
            out.to_str().unwrap(),
        ]);

        assert!(out.join("target_canvas_00.png").exists());
        assert!(out.join("target_canvas_01.png").exists());
        assert!(!out.join("target_canvas_02.png").exists());
        assert!(out.join("target_combined.png").exists());
    }

    // Tests pyramid runs end to end on a resized target
    // Verified by ignoring the resize bounds
    #[test]
    fn test_run_pyramid() {
        let dir = TempDir::new().unwrap();
        let target = write_target(dir.path());
        let out = dir.path().join("out");

        run(&[
            "shatterstack",
            "pyramid",
            target.to_str().unwrap(),
            "-c",
            "2",
            "--sigmas",
            "1,0",
            "--clusters",
            "3",
            "--min-blob-size",
            "2",
            "-i",
            "10",
            "-w",
            "5",
            "-H",
            "4",
            "-q",
            "-o",
            out.to_str().unwrap(),
        ]);

        let combined = load_image(out.join("target_combined.png")).unwrap();
        assert_eq!(combined.dim(), (4, 5, 3));
    }

    #[test]
    fn test_missing_target_fails() {
        let dir = TempDir::new().unwrap();
        let missing = dir.path().join("absent.png");
        let cli = Cli::parse_from(["p", "shatter", missing.to_str().unwrap(), "-q", "--no-cache"]);

        assert!(CommandRunner::new(cli).run().is_err());
    }
}
