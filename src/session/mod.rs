//! Interactive session tying the pieces together.

/// The [`studio::Studio`] session.
pub mod studio;
