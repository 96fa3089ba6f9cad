pub mod balances;
pub mod network;
pub mod status;
pub mod transact;

pub use balances::{format_units, RailgunWalletBalanceBucket, TokenBalance, TokenPrices, TokenRef};
pub use network::{NetworkName, TxidVersion};
pub use primitive_types::U256;
pub use status::{
    MerkletreeScanCurrentStatus, MerkletreeScanStatus, MerkletreeType, ProofBatcherState,
};
pub use transact::{
    CommitmentSummary, ContractTransaction, EncryptionKey, Erc20Amount, Erc20AmountRecipient,
    EvmGasType, FeeTokenDetails, NftAmountRecipient, NftTokenType,
    RailgunPopulateTransactionResponse, RailgunTransactionGasEstimateResponse,
    TransactionGasDetails, UnshieldToOriginRecipients,
};
