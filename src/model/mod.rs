pub mod descriptor;
pub mod record;
pub mod registry;

pub use descriptor::{
    AssociationDescriptor, Cardinality, CascadePolicy, ModelDescriptor, ReferenceDescriptor,
};
pub use record::{AssociationTarget, Record};
pub use registry::ModelRegistry;
