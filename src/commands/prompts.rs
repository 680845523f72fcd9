use crate::agent::{Role, roles};

/// The roles exactly as they are sent to the model.
pub fn run() -> Vec<Role> {
    vec![roles::developer(), roles::qa()]
}
