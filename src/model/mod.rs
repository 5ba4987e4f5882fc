//! Generator and discriminator networks of the DCGAN.

pub mod discriminator;
pub mod generator;

pub use discriminator::{Discriminator, DiscriminatorConfig};
pub use generator::{Generator, GeneratorConfig};
