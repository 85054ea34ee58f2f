pub mod ensure;
pub mod verify;
