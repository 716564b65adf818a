use clap::Parser;

use crate::fs::{DEFAULT_IMAGE_PATH, DEFAULT_IMAGE_SIZE};

/// a flat filesystem kept in a single fixed-size image file, served through `FUSE`
#[derive(Parser, Debug, PartialEq)]
#[command(author, version, about, long_about)]
pub enum FlatFsCli {
    /// create a new file system
    Mkfs(MkfsArgs),
    /// load (or create) a file system, register it to `FUSE` and mount it
    Mount(MountArgs),
    /// print the superblock and the file table of a file system
    Info(InfoArgs),
}
///make a new fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "make a new file system")]
pub struct MkfsArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_PATH)]
    pub image_file_path: String,
    /// the size of the image file in bytes
    #[clap(short, long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub size: u64,
    /// overwrite an existing image file
    #[clap(short, long)]
    pub force: bool,
}

/// mount a fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "mount a file system")]
pub struct MountArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_PATH)]
    pub image_file_path: String,
    /// the mount point of the file system
    #[clap(short, long)]
    pub mount_point: String,
    /// the size of the image file in bytes
    #[clap(short, long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub size: u64,
    /// a `FUSE` mount option, like `auto_unmount` or `allow_other`
    #[clap(short = 'o', long = "option")]
    pub options: Vec<String>,
    /// fail instead of reformatting an image of the wrong size or with a bad magic number
    #[clap(long)]
    pub no_reformat: bool,
}

/// show a fs subcommand
#[derive(clap::Args, Debug, PartialEq)]
#[command(author, version, about = "show a file system")]
pub struct InfoArgs {
    /// the path of the file system image file
    #[clap(short = 'p', long, default_value = DEFAULT_IMAGE_PATH)]
    pub image_file_path: String,
    /// the size of the image file in bytes
    #[clap(short, long, default_value_t = DEFAULT_IMAGE_SIZE)]
    pub size: u64,
}

/// test the `FlatFsCli` struct
/// test `mkfs` subcommand
#[cfg(test)]
mod mkfs_parse_args_tests {
    use super::*;
    /// test short parameter form
    #[test]
    fn test_short_parameter_form() {
        let args = FlatFsCli::parse_from(["flatfs", "mkfs", "-p", "test", "-s", "4096", "-f"]);
        assert_eq!(
            args,
            FlatFsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                size: 4096,
                force: true,
            })
        );
    }
    /// test long parameter form
    #[test]
    fn test_long_parameter_form() {
        let image_file_path_name = concat!("--", "image-file-path");
        let args = FlatFsCli::parse_from([
            "flatfs",
            "mkfs",
            image_file_path_name,
            "test",
            "--size",
            "4096",
        ]);
        assert_eq!(
            args,
            FlatFsCli::Mkfs(MkfsArgs {
                image_file_path: "test".to_string(),
                size: 4096,
                force: false,
            })
        );
    }
    /// test default values
    #[test]
    fn test_defaults() {
        let args = FlatFsCli::parse_from(["flatfs", "mkfs"]);
        assert_eq!(
            args,
            FlatFsCli::Mkfs(MkfsArgs {
                image_file_path: DEFAULT_IMAGE_PATH.to_string(),
                size: DEFAULT_IMAGE_SIZE,
                force: false,
            })
        );
    }
}


#[cfg(test)]
mod info_parse_args_tests {
    use super::*;
    #[test]
    fn test_info() {
        let args = FlatFsCli::parse_from(["flatfs", "info", "-p", "image.db"]);
        assert_eq!(
            args,
            FlatFsCli::Info(InfoArgs {
                image_file_path: "image.db".to_string(),
                size: DEFAULT_IMAGE_SIZE,
            })
        );
    }
}
