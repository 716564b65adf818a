/// an enum to describe the type of an entry in the namespace
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub enum FileKind {
    /// a file stored in a slot
    RegularFile,
    /// the root directory, the only directory there is
    Directory,
}

/// implement a trait to convert [FileKind] to [fuser::FileType]
impl From<FileKind> for fuser::FileType {
    fn from(kind: FileKind) -> Self {
        match kind {
            FileKind::RegularFile => fuser::FileType::RegularFile,
            FileKind::Directory => fuser::FileType::Directory,
        }
    }
}
