pub mod file;
pub mod file_version;
pub mod stash;

pub use file::Entity as File;
pub use file_version::Entity as FileVersion;
pub use stash::Entity as Stash;
