//! In-memory ledger with all-or-nothing transactions
//!
//! [`Ledger::transact`] runs a closure against a private copy of the state
//! and only publishes the copy if the closure returns `Ok`. Transactions
//! are serialized by the write lock, mirroring how a chain orders state
//! transitions.

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::{Deserialize, Serialize};
use swapline_core::{Address, Amount, ChainError, TxId};
use tokio::sync::RwLock;

use crate::pools::{PoolLiquidity, PoolSnapshot};

/// Current block
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct BlockInfo {
    pub height: u64,
    /// Unix seconds
    pub timestamp: u64,
}

/// Complete ledger state
#[derive(Debug, Clone, Default)]
pub struct LedgerState {
    pub block: BlockInfo,
    pools: BTreeMap<Address, PoolSnapshot>,
    /// token -> owner -> balance
    balances: HashMap<Address, HashMap<Address, Amount>>,
    /// (token, owner, spender) -> allowance
    allowances: HashMap<(Address, Address, Address), Amount>,
    /// Accounts whose incoming transfers are rejected
    frozen: HashSet<Address>,
}

impl LedgerState {
    pub fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.balances
            .get(token)
            .and_then(|m| m.get(owner))
            .copied()
            .unwrap_or(0)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.allowances
            .get(&(token.clone(), owner.clone(), spender.clone()))
            .copied()
            .unwrap_or(0)
    }

    pub fn pool(&self, address: &Address) -> Result<&PoolSnapshot, ChainError> {
        self.pools.get(address).ok_or_else(|| ChainError::PoolNotFound {
            pool: address.clone(),
        })
    }

    pub fn pools(&self) -> impl Iterator<Item = &PoolSnapshot> {
        self.pools.values()
    }

    fn credit(&mut self, token: &Address, owner: &Address, amount: Amount) {
        let entry = self
            .balances
            .entry(token.clone())
            .or_default()
            .entry(owner.clone())
            .or_insert(0);
        *entry = entry.saturating_add(amount);
    }

    fn debit(&mut self, token: &Address, owner: &Address, amount: Amount) -> Result<(), ChainError> {
        let available = self.balance_of(token, owner);
        if available < amount {
            return Err(ChainError::InsufficientBalance {
                token: token.clone(),
                owner: owner.clone(),
                required: amount,
                available,
            });
        }
        if let Some(m) = self.balances.get_mut(token) {
            m.insert(owner.clone(), available - amount);
        }
        Ok(())
    }
}

/// Mutable view handed to a transaction closure
#[derive(Debug)]
pub struct Transaction {
    state: LedgerState,
}

impl Transaction {
    pub fn block(&self) -> BlockInfo {
        self.state.block
    }

    pub fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.state.balance_of(token, owner)
    }

    pub fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.state.allowance(token, owner, spender)
    }

    pub fn pool(&self, address: &Address) -> Result<&PoolSnapshot, ChainError> {
        self.state.pool(address)
    }

    /// Replace a pool's state. The pool must already exist.
    pub fn set_pool(&mut self, snapshot: PoolSnapshot) -> Result<(), ChainError> {
        if !self.state.pools.contains_key(&snapshot.address) {
            return Err(ChainError::PoolNotFound {
                pool: snapshot.address,
            });
        }
        self.state.pools.insert(snapshot.address.clone(), snapshot);
        Ok(())
    }

    pub fn transfer(
        &mut self,
        token: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ChainError> {
        if self.state.frozen.contains(to) {
            return Err(ChainError::TransferRejected {
                token: token.clone(),
                to: to.clone(),
            });
        }
        self.state.debit(token, from, amount)?;
        self.state.credit(token, to, amount);
        Ok(())
    }

    /// Move `owner`'s tokens on behalf of `spender`, consuming allowance.
    pub fn transfer_from(
        &mut self,
        token: &Address,
        owner: &Address,
        spender: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ChainError> {
        let available = self.state.allowance(token, owner, spender);
        if available < amount {
            return Err(ChainError::InsufficientAllowance {
                token: token.clone(),
                owner: owner.clone(),
                spender: spender.clone(),
                required: amount,
                available,
            });
        }
        self.transfer(token, owner, to, amount)?;
        self.state.allowances.insert(
            (token.clone(), owner.clone(), spender.clone()),
            available - amount,
        );
        Ok(())
    }

    /// Lock `amount` of the native asset from `from` in the wrapper
    /// contract and credit the same amount of wrapped token to `to`.
    pub fn wrap_native(
        &mut self,
        wrapped: &Address,
        from: &Address,
        to: &Address,
        amount: Amount,
    ) -> Result<(), ChainError> {
        self.state.debit(&Address::native(), from, amount)?;
        self.state.credit(&Address::native(), wrapped, amount);
        self.state.credit(wrapped, to, amount);
        Ok(())
    }
}

/// Shared handle to the ledger
#[derive(Debug, Clone, Default)]
pub struct Ledger {
    inner: Arc<RwLock<LedgerState>>,
}

impl Ledger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` atomically: every change it makes is published, or none is.
    pub async fn transact<T, E, F>(&self, f: F) -> Result<(T, TxId), E>
    where
        F: FnOnce(&mut Transaction) -> Result<T, E>,
    {
        let mut state = self.inner.write().await;
        let mut tx = Transaction {
            state: state.clone(),
        };
        let output = f(&mut tx)?;
        *state = tx.state;
        Ok((output, TxId::new(uuid::Uuid::new_v4().to_string())))
    }

    /// Read-only access to a consistent view of the state
    pub async fn read<T>(&self, f: impl FnOnce(&LedgerState) -> T) -> T {
        let state = self.inner.read().await;
        f(&state)
    }

    pub async fn block(&self) -> BlockInfo {
        self.inner.read().await.block
    }

    pub async fn set_block(&self, block: BlockInfo) {
        self.inner.write().await.block = block;
    }

    pub async fn balance_of(&self, token: &Address, owner: &Address) -> Amount {
        self.inner.read().await.balance_of(token, owner)
    }

    pub async fn pool(&self, address: &Address) -> Result<PoolSnapshot, ChainError> {
        self.inner.read().await.pool(address).cloned()
    }

    /// Register a pool and fund it with the tokens its liquidity holds:
    /// reserves for constant-product pools, the amounts locked across every
    /// tick range for concentrated-liquidity pools.
    pub async fn add_pool(&self, mut snapshot: PoolSnapshot) {
        let funding = match &mut snapshot.liquidity {
            PoolLiquidity::ConstantProduct { reserve0, reserve1 } => Some((*reserve0, *reserve1)),
            PoolLiquidity::ConcentratedLiquidity(cl) => {
                cl.normalize();
                cl.locked_amounts()
            }
        };
        let mut state = self.inner.write().await;
        match funding {
            Some((amount0, amount1)) => {
                state.credit(&snapshot.token0, &snapshot.address, amount0);
                state.credit(&snapshot.token1, &snapshot.address, amount1);
            }
            None => tracing::warn!(pool = %snapshot.address, "pool liquidity is inconsistent, left unfunded"),
        }
        state.pools.insert(snapshot.address.clone(), snapshot);
    }

    pub async fn mint(&self, token: &Address, to: &Address, amount: Amount) {
        self.inner.write().await.credit(token, to, amount);
    }

    pub async fn approve(&self, token: &Address, owner: &Address, spender: &Address, amount: Amount) {
        self.inner
            .write()
            .await
            .allowances
            .insert((token.clone(), owner.clone(), spender.clone()), amount);
    }

    pub async fn allowance(&self, token: &Address, owner: &Address, spender: &Address) -> Amount {
        self.inner.read().await.allowance(token, owner, spender)
    }

    /// Reject every future transfer into `account`.
    pub async fn freeze(&self, account: &Address) {
        self.inner.write().await.frozen.insert(account.clone());
    }
}
