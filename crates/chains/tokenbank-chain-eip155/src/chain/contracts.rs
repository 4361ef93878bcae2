//! Solidity bindings for the contracts the client talks to.
//!
//! The token is an ERC-20 with EIP-2612 `permit` support. The bank holds
//! deposits per owner and accepts three deposit entry points. Permit2 is only
//! ever touched indirectly (the bank pulls through it), so only its EIP-712
//! struct shapes are needed here.

use alloy_sol_types::sol;
use serde::{Deserialize, Serialize};

sol!(
    #[allow(missing_docs)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface IERC20Permit {
        function name() external view returns (string memory);
        function symbol() external view returns (string memory);
        function decimals() external view returns (uint8);
        function balanceOf(address account) external view returns (uint256);
        function allowance(address owner, address spender) external view returns (uint256);
        function approve(address spender, uint256 value) external returns (bool);
        function nonces(address owner) external view returns (uint256);
    }
);

sol!(
    #[allow(missing_docs)]
    #[allow(clippy::too_many_arguments)]
    #[derive(Debug)]
    #[sol(rpc)]
    interface ITokenBank {
        struct TokenPermissions {
            address token;
            uint256 amount;
        }

        struct PermitTransferFrom {
            TokenPermissions permitted;
            uint256 nonce;
            uint256 deadline;
        }

        function deposit(uint256 amount) external;
        function withdraw(uint256 amount) external;
        function permitDeposit(address owner, uint256 amount, uint256 deadline, uint8 v, bytes32 r, bytes32 s) external;
        function depositWithPermit2(PermitTransferFrom calldata permit, bytes calldata signature, address owner) external;
        function getDeposit(address user) external view returns (uint256);
    }
);

sol! {
    /// EIP-2612 `Permit`, signed against the token's own domain.
    #[derive(Debug, Serialize, Deserialize)]
    struct Permit {
        address owner;
        address spender;
        uint256 value;
        uint256 nonce;
        uint256 deadline;
    }

    /// Permit2 `PermitTransferFrom`, signed against the Permit2 domain.
    ///
    /// Unlike the struct the bank receives, the signed message names the
    /// spender; Permit2 fills it in from `msg.sender` when verifying.
    #[derive(Debug, Serialize, Deserialize)]
    struct PermitTransferFrom {
        TokenPermissions permitted;
        address spender;
        uint256 nonce;
        uint256 deadline;
    }

    /// Token and amount covered by a Permit2 transfer.
    #[derive(Debug, Serialize, Deserialize)]
    struct TokenPermissions {
        address token;
        uint256 amount;
    }
}
