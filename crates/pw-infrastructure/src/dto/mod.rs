//! Data Transfer Objects (DTOs) for persistence.
//!
//! These DTOs represent the versioned schema of stored records. They are
//! private to the infrastructure layer and absorb the evolution of the
//! storage format over time.
//!
//! ### Character Version History
//! - **1.0.0**: Flat `appearanceSpecies`, optional timestamps
//! - **2.0.0**: Nested appearance species, required timestamps

mod character;

pub use character::{
    CHARACTER_ENTITY, CharacterV1_0_0, CharacterV2_0_0, create_character_migrator,
};
