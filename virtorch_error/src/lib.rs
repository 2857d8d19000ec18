use bon::bon;
use miette::{Diagnostic, Report};
pub use pipelight_error::{CastError, TomlError};

use std::fmt;
use std::time::Duration;
use thiserror::Error;

#[derive(Debug, Error, Diagnostic)]
pub enum VirtorchError {
    ////////////////////////////////
    // Lib native errors
    #[error(transparent)]
    #[diagnostic(transparent)]
    WrapError(#[from] WrapError),

    #[error(transparent)]
    #[diagnostic(transparent)]
    LibError(#[from] LibError),

    ////////////////////////////////
    // Remote platform conditions
    #[error("{kind} {id:?} not found")]
    #[diagnostic(code(virtorch::remote::not_found))]
    NotFound { kind: String, id: String },

    #[error("{kind} {id:?} is locked")]
    #[diagnostic(code(virtorch::remote::locked))]
    Locked { kind: String, id: String },

    #[error("timed out after {after:?} waiting for {what} (last: {last})")]
    #[diagnostic(code(virtorch::remote::timeout))]
    Timeout {
        what: String,
        after: Duration,
        last: String,
    },

    #[error("remote platform unavailable: {reason}")]
    #[diagnostic(code(virtorch::remote::unavailable))]
    Unavailable { reason: String },

    #[error("remote platform rejected {operation}: {reason}")]
    #[diagnostic(code(virtorch::remote::rejected))]
    RejectedByRemote { operation: String, reason: String },

    ////////////////////////////////
    // Orchestration failures
    #[error("couldn't attach disk {disk_id:?}: {reason}")]
    #[diagnostic(
        code(virtorch::disk::attach_rejected),
        help("check the disk interface against the disk's shareable and format flags")
    )]
    AttachRejected { disk_id: String, reason: String },

    #[error("couldn't create network interface {nic:?}: {reason}")]
    #[diagnostic(code(virtorch::nic::create_failed))]
    NicCreateFailed { nic: String, reason: String },

    #[error("no vnic profile named {network:?} in data center {data_center:?}")]
    #[diagnostic(
        code(virtorch::resolve::profile_not_found),
        help("vnic profiles are matched by name within the cluster's data center only")
    )]
    ProfileNotFound {
        network: String,
        data_center: String,
    },

    #[error("{count} {kind}s are named {name:?}")]
    #[diagnostic(
        code(virtorch::resolve::ambiguous),
        help("reference it by id instead of by name")
    )]
    AmbiguousReference {
        kind: String,
        name: String,
        count: usize,
    },

    #[error("invalid desired state, {field}: {reason}")]
    #[diagnostic(code(virtorch::desired::invalid))]
    InvalidDesiredState { field: String, reason: String },

    #[error("{operation} is not supported")]
    #[diagnostic(
        code(virtorch::unsupported),
        help("destroy and recreate the vm to apply a changed desired state")
    )]
    Unsupported { operation: String },

    #[error("{step} failed")]
    #[diagnostic(code(virtorch::step::error))]
    Step {
        step: Step,
        source: Box<VirtorchError>,
    },

    #[error("vm {id:?} was created but its creation didn't complete")]
    #[diagnostic(
        code(virtorch::create::partial),
        help("read or delete the vm by its id")
    )]
    PartiallyCreated {
        id: String,
        /// The vm no longer exists on the platform.
        removed: bool,
        source: Box<VirtorchError>,
    },

    ////////////////////////////////
    // Type convertion
    #[error(transparent)]
    #[diagnostic(transparent)]
    CastError(#[from] CastError),

    #[error(transparent)]
    #[diagnostic(code(virtorch::io::error))]
    IoError(#[from] std::io::Error),
}

impl VirtorchError {
    /// Annotate the error with the state machine step it failed at.
    pub fn at(self, step: Step) -> Self {
        VirtorchError::Step {
            step,
            source: Box::new(self),
        }
    }
    /// The error stripped of its step and partial creation annotations.
    pub fn root(&self) -> &VirtorchError {
        match self {
            VirtorchError::Step { source, .. } => source.root(),
            VirtorchError::PartiallyCreated { source, .. } => source.root(),
            other => other,
        }
    }
    /// The innermost step annotation, if any.
    pub fn step(&self) -> Option<&Step> {
        match self {
            VirtorchError::Step { step, source } => source.step().or(Some(step)),
            VirtorchError::PartiallyCreated { source, .. } => source.step(),
            _ => None,
        }
    }
    /// Id the platform gave to the vm of a failed creation.
    pub fn created_id(&self) -> Option<&str> {
        match self {
            VirtorchError::PartiallyCreated { id, .. } => Some(id),
            VirtorchError::Step { source, .. } => source.created_id(),
            _ => None,
        }
    }
    /// Whether a failed creation left a vm on the platform.
    pub fn left_vm_behind(&self) -> bool {
        match self {
            VirtorchError::PartiallyCreated { removed, .. } => !removed,
            VirtorchError::Step { source, .. } => source.left_vm_behind(),
            _ => false,
        }
    }
    pub fn is_not_found(&self) -> bool {
        matches!(self.root(), VirtorchError::NotFound { .. })
    }
    /// Conditions worth retrying until their bound elapses.
    pub fn is_transient(&self) -> bool {
        matches!(
            self.root(),
            VirtorchError::Locked { .. } | VirtorchError::Unavailable { .. }
        )
    }
    pub fn not_found(kind: impl fmt::Display, id: &str) -> Self {
        VirtorchError::NotFound {
            kind: kind.to_string(),
            id: id.to_owned(),
        }
    }
    pub fn rejected(operation: &str, reason: impl fmt::Display) -> Self {
        VirtorchError::RejectedByRemote {
            operation: operation.to_owned(),
            reason: reason.to_string(),
        }
    }
}

/**
The steps of the vm and disk lifecycle state machines.
Used to tell which step of a sequence an error came from.
*/
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Step {
    // Create
    Validate,
    Resolve,
    Create,
    CreateSettle,
    AttachDisk { index: usize, disk_id: String },
    ProvisionNic { index: usize, label: String },
    Start,
    ReadBack,
    // Delete
    Check,
    Shutdown,
    ShutdownSettle,
    Remove,
    // Disk resource
    DiskCreate,
    DiskSettle,
}
impl fmt::Display for Step {
    fn fmt(&self, f: &mut fmt::Formatter) -> fmt::Result {
        match self {
            Step::Validate => write!(f, "validation"),
            Step::Resolve => write!(f, "reference resolution"),
            Step::Create => write!(f, "vm creation"),
            Step::CreateSettle => write!(f, "waiting for the new vm to settle"),
            Step::AttachDisk { index, disk_id } => {
                write!(f, "disk attachment #{} ({})", index, disk_id)
            }
            Step::ProvisionNic { index, label } => {
                write!(f, "network interface #{} ({})", index, label)
            }
            Step::Start => write!(f, "vm start"),
            Step::ReadBack => write!(f, "vm read-back"),
            Step::Check => write!(f, "vm status check"),
            Step::Shutdown => write!(f, "vm shutdown"),
            Step::ShutdownSettle => write!(f, "waiting for the vm to power down"),
            Step::Remove => write!(f, "vm removal"),
            Step::DiskCreate => write!(f, "disk creation"),
            Step::DiskSettle => write!(f, "waiting for the new disk to unlock"),
        }
    }
}

/**
An error with help and a higher origin.
Can be recursively chained.
*/
#[derive(Debug, Error, Diagnostic)]
#[error("{}", message)]
#[diagnostic(code(virtorch::wrap::error))]
pub struct WrapError {
    pub message: String,
    #[diagnostic_source]
    pub origin: Report,
    #[help]
    pub help: String,
}

#[bon]
impl WrapError {
    #[builder]
    pub fn new(msg: &str, help: &str, origin: Report) -> Self {
        Self {
            message: msg.to_owned(),
            help: help.to_owned(),
            origin,
        }
    }
}

/**
A root cause error with no inner origin
*/
#[derive(Debug, Error, Diagnostic)]
#[error("{}", message)]
#[diagnostic(code(virtorch::lib::error))]
pub struct LibError {
    pub message: String,
    #[help]
    pub help: String,
}

#[bon]
impl LibError {
    #[builder]
    pub fn new(msg: &str, help: &str) -> Self {
        Self {
            message: msg.to_owned(),
            help: help.to_owned(),
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn root_skips_step_annotations() {
        let err = VirtorchError::not_found("disk", "d1")
            .at(Step::AttachDisk {
                index: 1,
                disk_id: "d1".to_owned(),
            })
            .at(Step::Create);

        assert!(err.is_not_found());
        assert!(!err.is_transient());
        assert!(matches!(err.root(), VirtorchError::NotFound { .. }));
        assert_eq!(
            err.step(),
            Some(&Step::AttachDisk {
                index: 1,
                disk_id: "d1".to_owned()
            })
        );
    }

    #[test]
    fn partial_creation_keeps_the_vm_id() {
        let err = VirtorchError::PartiallyCreated {
            id: "vm-1".to_owned(),
            removed: false,
            source: Box::new(VirtorchError::rejected("start vm", "no host").at(Step::Start)),
        };
        assert_eq!(err.created_id(), Some("vm-1"));
        assert!(err.left_vm_behind());
        assert_eq!(err.step(), Some(&Step::Start));
        assert!(matches!(err.root(), VirtorchError::RejectedByRemote { .. }));
        assert_eq!(VirtorchError::not_found("vm", "vm-1").created_id(), None);
    }

    #[test]
    fn locked_and_unavailable_are_transient() {
        let locked = VirtorchError::Locked {
            kind: "disk".to_owned(),
            id: "d1".to_owned(),
        };
        let down = VirtorchError::Unavailable {
            reason: "connection reset".to_owned(),
        };
        assert!(locked.is_transient());
        assert!(down.at(Step::Check).is_transient());
        assert!(!VirtorchError::rejected("start", "no host").is_transient());
    }
}
