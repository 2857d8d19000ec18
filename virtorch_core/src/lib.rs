/*
* Virtual machine lifecycle orchestration against a virtualization management platform.
*
* A declarative desired state (VmDesiredState) is turned into an ordered sequence of
* remote calls (create, attach disks, add nics, start), and the remote entity graph
* is flattened back into that same shape for read-back.
*
* The remote platform is only reached through the Platform trait.
*/

pub mod config;
pub mod desired;
pub mod disk;
pub mod flatten;
pub mod nic;
pub mod orchestrator;
pub mod platform;
pub mod resolver;
pub mod retry;

// Reexports
pub use config::OrchestratorConfig;
pub use desired::{
    BootProtocol, ClusterRef, CpuTopology, DiskAttachmentSpec, DiskDesiredState,
    NetworkInterfaceSpec, TemplateRef, VmDesiredState,
};
pub use orchestrator::{Created, Orchestrator};
pub use platform::{MemoryPlatform, Platform};
pub use retry::{Attempt, Backoff, Poll};
