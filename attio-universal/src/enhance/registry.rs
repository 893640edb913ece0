use super::enhancers::{
    AttributeNotFoundEnhancer, ComplexTypeEnhancer, RecordReferenceEnhancer,
    RequiredFieldsEnhancer, SelectOptionEnhancer, UniquenessEnhancer,
};
use super::{CrudOperation, Enhancer};
use crate::error::Result;
use crate::metadata::MetadataResolver;
use crate::operations::RecordLookup;
use std::sync::Arc;

/// Ordered enhancer chains for create and update
///
/// The order of each chain is the order of precedence: the coordinator
/// stops at the first enhancer that produces a message.
#[derive(Clone, Default)]
pub struct EnhancerRegistry {
    create_chain: Vec<Arc<dyn Enhancer>>,
    update_chain: Vec<Arc<dyn Enhancer>>,
}

impl EnhancerRegistry {
    /// Registry with no enhancers; every error falls back
    pub fn empty() -> Self {
        Self::default()
    }

    /// The standard chains
    ///
    /// Create runs required-fields and uniqueness before the shared tail;
    /// update runs the shared tail only.
    pub fn standard(resolver: MetadataResolver, lookup: Arc<dyn RecordLookup>) -> Result<Self> {
        let shared_tail: Vec<Arc<dyn Enhancer>> = vec![
            Arc::new(AttributeNotFoundEnhancer::new(resolver.clone())?),
            Arc::new(ComplexTypeEnhancer::new(resolver.clone())?),
            Arc::new(SelectOptionEnhancer::new(resolver.clone())?),
            Arc::new(RecordReferenceEnhancer::new()?),
        ];

        let mut create_chain: Vec<Arc<dyn Enhancer>> = vec![
            Arc::new(RequiredFieldsEnhancer::new(resolver)?),
            Arc::new(UniquenessEnhancer::new(lookup)),
        ];
        create_chain.extend(shared_tail.iter().cloned());

        Ok(Self {
            create_chain,
            update_chain: shared_tail,
        })
    }

    /// Registry with explicit chains
    pub fn with_chains(
        create_chain: Vec<Arc<dyn Enhancer>>,
        update_chain: Vec<Arc<dyn Enhancer>>,
    ) -> Self {
        Self {
            create_chain,
            update_chain,
        }
    }

    /// Append an enhancer to one chain
    pub fn register(&mut self, operation: CrudOperation, enhancer: Arc<dyn Enhancer>) {
        match operation {
            CrudOperation::Create => self.create_chain.push(enhancer),
            CrudOperation::Update => self.update_chain.push(enhancer),
        }
    }

    /// The chain for an operation, in precedence order
    pub fn chain(&self, operation: CrudOperation) -> &[Arc<dyn Enhancer>] {
        match operation {
            CrudOperation::Create => &self.create_chain,
            CrudOperation::Update => &self.update_chain,
        }
    }

    /// Enhancer names of a chain, in precedence order
    pub fn names(&self, operation: CrudOperation) -> Vec<&'static str> {
        self.chain(operation)
            .iter()
            .map(|enhancer| enhancer.name())
            .collect()
    }
}

impl std::fmt::Debug for EnhancerRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("EnhancerRegistry")
            .field("create_chain", &self.names(CrudOperation::Create))
            .field("update_chain", &self.names(CrudOperation::Update))
            .finish()
    }
}
