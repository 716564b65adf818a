use clap::Parser;
use flatfs::{cli_interface::FlatFsCli, ReformatPolicy};
/// a CLI interface to users to create our filesystem,
/// inspect it, or register it to `FUSE` and mount it.
///
/// Mounting blocks the program until the filesystem is unmounted,
///
/// or specify `-o auto_unmount` to have it unmounted when the program exits.
fn main() -> anyhow::Result<()> {
    env_logger::builder().format_timestamp_nanos().init();
    let args = FlatFsCli::parse();
    match args {
        FlatFsCli::Mkfs(args) => {
            //create a new file system
            flatfs::mkfs::mkfs(args.image_file_path, args.size, args.force)?;
        }
        FlatFsCli::Mount(args) => {
            //load or create the file system, then register it to `FUSE` and mount it
            let policy = if args.no_reformat {
                ReformatPolicy::Refuse
            } else {
                ReformatPolicy::Reformat
            };
            flatfs::mount::mount(
                args.image_file_path,
                args.mount_point,
                args.size,
                &args.options,
                policy,
            )?;
        }
        FlatFsCli::Info(args) => {
            flatfs::info::info(args.image_file_path, args.size)?;
        }
    }
    Ok(())
}
