use crate::platform::DiskFormat;

use bon::Builder;
use serde::{Deserialize, Serialize};
use std::fs;

// Error Handling
use virtorch_error::{CastError, TomlError, VirtorchError};

/**
A standalone disk, owned by its own lifecycle.
Vms only reference it by id through a DiskAttachmentSpec.

```toml
name = "web1_root"
size = 10737418240
format = "cow"
storage_domain_id = "072fbaa1-08f3-4a40-9f34-a5ca22dd1d74"
sparse = true
```
*/
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Builder)]
pub struct DiskDesiredState {
    #[builder(into)]
    pub name: String,
    /// Provisioned size in bytes.
    pub size: u64,
    pub format: DiskFormat,
    #[builder(into)]
    pub storage_domain_id: String,
    #[serde(default)]
    #[builder(default)]
    pub bootable: bool,
    #[serde(default)]
    #[builder(default)]
    pub shareable: bool,
    #[serde(default)]
    #[builder(default)]
    pub sparse: bool,
}

impl DiskDesiredState {
    pub fn validate(&self) -> Result<(), VirtorchError> {
        let invalid = |field: &str, reason: &str| VirtorchError::InvalidDesiredState {
            field: field.to_owned(),
            reason: reason.to_owned(),
        };
        if self.name.trim().is_empty() {
            return Err(invalid("name", "must not be empty"));
        }
        if self.size == 0 {
            return Err(invalid("size", "must be positive"));
        }
        if self.storage_domain_id.trim().is_empty() {
            return Err(invalid("storage_domain_id", "must not be empty"));
        }
        Ok(())
    }

    pub fn from_file(path: &str) -> Result<Self, VirtorchError> {
        let string = fs::read_to_string(path)?;
        Self::from_toml(&string)
    }
    pub fn from_toml(string: &str) -> Result<Self, VirtorchError> {
        let res = toml::from_str::<Self>(string);
        let item = match res {
            Ok(res) => res,
            Err(e) => {
                let err = CastError::TomlError(TomlError::new(e, string));
                return Err(err.into());
            }
        };
        Ok(item)
    }
}

#[cfg(test)]
mod test {
    use super::*;
    use miette::Result;

    #[test]
    fn get_disk_from_toml() -> Result<()> {
        let toml = r#"
            name = "web1_root"
            size = 10737418240
            format = "cow"
            storage_domain_id = "data"
            sparse = true
        "#;
        let disk = DiskDesiredState::from_toml(toml)?;
        assert_eq!(disk.format, DiskFormat::Cow);
        assert!(!disk.bootable);
        disk.validate()?;
        Ok(())
    }

    #[test]
    fn refuse_empty_disk() {
        let disk = DiskDesiredState::builder()
            .name("web1_root")
            .size(0)
            .format(DiskFormat::Raw)
            .storage_domain_id("data")
            .build();
        assert!(matches!(
            disk.validate(),
            Err(VirtorchError::InvalidDesiredState { .. })
        ));
    }
}
