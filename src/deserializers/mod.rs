///! Account deserializers
///! Voter records (header + deposit slots) and registrar weighting config

pub mod deposit;
pub mod registrar;
pub mod voter;

pub use deposit::{
    extract_deposits, DepositExtraction, DepositFilter, DepositRecord, Lockup, LockupKind,
    RejectedSlot,
};
pub use registrar::RegistrarConfig;
pub use voter::{read_header, VoterAccount, VoterHeader};
