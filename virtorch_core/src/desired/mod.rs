/*
* The caller declared shapes.
*
* Supplied per invocation and never retained.
* Validated once at the boundary, the rest of the crate relies on it.
*/
mod disk;
mod vm;

// Reexports
pub use crate::platform::{BootProtocol, CpuTopology, DiskFormat, DiskInterface};
pub use disk::DiskDesiredState;
pub use vm::{ClusterRef, DiskAttachmentSpec, NetworkInterfaceSpec, TemplateRef, VmDesiredState};
