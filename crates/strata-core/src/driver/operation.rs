#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Operation {
    /// Execute a SQL statement
    Sql(String),

    /// Execute a transaction lifecycle op
    Transaction(Transaction),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Transaction {
    /// Start a transaction
    Start,

    /// Commit a transaction
    Commit,

    /// Rollback a transaction
    Rollback,
}

impl From<Transaction> for Operation {
    fn from(value: Transaction) -> Operation {
        Operation::Transaction(value)
    }
}

impl From<String> for Operation {
    fn from(value: String) -> Operation {
        Operation::Sql(value)
    }
}
