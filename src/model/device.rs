/// A device registered and authenticated by the caller. The index trusts
/// its identity and performs no verification of its own.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RegisteredDevice {
    user_id: String,
}

impl RegisteredDevice {
    pub fn new(user_id: impl Into<String>) -> Self {
        Self {
            user_id: user_id.into(),
        }
    }

    /// The stable voter identity of this device's owner.
    pub fn user_id(&self) -> &str {
        &self.user_id
    }
}
