mod address_repo;
mod transaction_repo;

pub use address_repo::AddressRepository;
pub use transaction_repo::TransactionRepository;
