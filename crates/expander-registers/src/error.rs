use expander_frame::FrameError;

/// Errors raised while resolving registers or converting payloads.
#[derive(Debug, thiserror::Error)]
pub enum RegisterError {
    /// No register with this name exists in the map.
    #[error("unknown register '{0}'")]
    UnknownRegister(String),

    /// No register is mapped at this address.
    #[error("no register at address {0}")]
    UnknownAddress(u8),

    /// Two descriptors claim the same address.
    #[error("registers '{first}' and '{second}' share address {address}")]
    AddressCollision {
        address: u8,
        first: &'static str,
        second: &'static str,
    },

    /// Two descriptors share a name.
    #[error("register name '{0}' is defined twice")]
    DuplicateName(&'static str),

    /// A frame for another register was decoded against this one.
    #[error("frame for address {actual} decoded as '{register}' (address {expected})")]
    AddressMismatch {
        register: &'static str,
        expected: u8,
        actual: u8,
    },

    /// The value or frame type does not match the register's declared type.
    #[error("type mismatch on '{register}': expected {expected}, got {actual}")]
    TypeMismatch {
        register: &'static str,
        expected: String,
        actual: String,
    },

    /// The payload width disagrees with the wire type.
    #[error("invalid payload length for address {address}: expected {expected} bytes, got {actual}")]
    InvalidLength {
        address: u8,
        expected: usize,
        actual: usize,
    },

    /// The raw value is not a member of the register's enumeration.
    #[error("value {value} is not valid for '{register}'")]
    InvalidValue {
        register: &'static str,
        value: String,
    },

    /// The register does not permit the requested access.
    #[error("register '{register}' does not support {operation} (access {access})")]
    AccessDenied {
        register: &'static str,
        operation: &'static str,
        access: crate::wire::AccessMode,
    },

    /// Malformed frame bytes.
    #[error("protocol error: {0}")]
    Protocol(#[from] FrameError),

    /// A timestamped decode was requested on a frame without timestamp.
    #[error("frame for '{0}' carries no timestamp")]
    MissingTimestamp(&'static str),
}

pub type Result<T> = std::result::Result<T, RegisterError>;
