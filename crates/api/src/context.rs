use grouppool_core::AccountId;

/// Identity of the account making a request.
///
/// Immutable and present on every ledger route; the ledger trusts it as the
/// caller of each operation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallerContext {
    account: AccountId,
}

impl CallerContext {
    pub fn new(account: AccountId) -> Self {
        Self { account }
    }

    pub fn account(&self) -> &AccountId {
        &self.account
    }

    pub fn into_account(self) -> AccountId {
        self.account
    }
}
