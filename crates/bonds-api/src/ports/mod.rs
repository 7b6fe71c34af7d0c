//! Ports (trait seams) between the flows and their infrastructure.

pub mod outbound;

pub use outbound::{
    BondRepository, Clock, CodeNotifier, Mutation, RepoResult, RepositoryError,
    TransactionRepository, UserRepository,
};
