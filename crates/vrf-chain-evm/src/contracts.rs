//! Inline Solidity interface definitions for the three client-chain contracts
//! the worker talks to: `VRFProvider`, `VRFLens`, and `Bridge`.
//!
//! No ABI JSON ships with this crate; the interfaces are small enough, and
//! stable enough across deployments, to declare inline.

use alloy_sol_types::sol;

sol! {
    #[derive(Debug)]
    struct VRFTask {
        bool isResolved;
        uint64 time;
        address caller;
        uint256 taskFee;
        bytes32 seed;
        bytes clientSeed;
        bytes32 result;
    }

    #[sol(rpc)]
    interface VRFProvider {
        function taskNonce() external view returns (uint64);
        function oracleScriptID() external view returns (uint64);
        function relayProof(bytes calldata proof, uint64 nonce) external;
    }

    #[sol(rpc)]
    interface VRFLens {
        function getTasksBulk(uint64[] calldata nonces) external view returns (VRFTask[] memory);
    }

    struct ValidatorWithPower {
        address addr;
        uint256 power;
    }

    #[sol(rpc)]
    interface Bridge {
        function encodedChainID() external view returns (bytes memory);
        function getAllValidatorPowers() external view returns (ValidatorWithPower[] memory);
    }
}
