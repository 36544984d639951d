//! Chain-agnostic data model for the VRF relay worker: the `Task` entity, the
//! validator power map, decoded proof shapes, the task store seam, and shared
//! config primitives. Every other crate in this workspace depends on this one.

pub mod config;
pub mod proof;
pub mod store;
pub mod task;
pub mod validator;

pub use config::{EngineConfig, LiteralOrEnv, RpcConfig};
pub use proof::{
    BlockHeaderMerklePartsData, CommonEncodedVotePartData, MultiStoreData, ProofBundle,
    RecoveredSignature, RelayData, TmSignature,
};
pub use store::{InMemoryTaskStore, StoreError, StoreRecord, TaskStore};
pub use task::{QueueItem, Task};
pub use validator::{DuplicateValidator, ValidatorPowerMap};
