/// SQL dialect spoken by a driver.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Dialect {
    Sqlite,
    Postgresql,
    Mysql,
}

#[derive(Debug)]
pub struct Capability {
    pub dialect: Dialect,

    /// DDL statements take part in transactions and roll back with them.
    /// When false, migrations use the compensating two-phase fallback.
    pub transactional_ddl: bool,

    /// Schema mutation capabilities supported by the database.
    pub schema_mutations: SchemaMutations,

    /// Longest identifier the database accepts, in bytes.
    pub max_identifier_length: usize,

    /// When `Some` the database supports varchar types with the specified
    /// upper limit.
    pub varchar: Option<u64>,
}

#[derive(Debug)]
pub struct SchemaMutations {
    /// `ALTER TABLE .. ALTER COLUMN` can change type, nullability and
    /// default. When false, the table is rebuilt.
    pub alter_column: bool,

    /// Constraints can be added to and dropped from an existing table.
    pub alter_constraints: bool,

    /// A `NOT NULL` column without a default can be added in place.
    pub add_required_column: bool,
}

impl Capability {
    /// SQLite capabilities.
    pub const SQLITE: Self = Self {
        dialect: Dialect::Sqlite,
        transactional_ddl: true,
        schema_mutations: SchemaMutations {
            alter_column: false,
            alter_constraints: false,
            add_required_column: false,
        },
        // SQLite does not limit identifier length.
        max_identifier_length: 1024,
        // SQLite ignores the "N" in VARCHAR(N); the only hard limit is
        // SQLITE_MAX_LENGTH.
        varchar: Some(1_000_000_000),
    };

    /// PostgreSQL capabilities
    pub const POSTGRESQL: Self = Self {
        dialect: Dialect::Postgresql,
        transactional_ddl: true,
        schema_mutations: SchemaMutations {
            alter_column: true,
            alter_constraints: true,
            add_required_column: true,
        },
        // NAMEDATALEN - 1
        max_identifier_length: 63,
        // The maximum n you can specify is 10 485 760 characters.
        varchar: Some(10_485_760),
    };

    /// MySQL capabilities
    pub const MYSQL: Self = Self {
        dialect: Dialect::Mysql,
        // Every DDL statement causes an implicit commit.
        transactional_ddl: false,
        schema_mutations: SchemaMutations {
            alter_column: true,
            alter_constraints: true,
            add_required_column: true,
        },
        max_identifier_length: 64,
        // The effective maximum length of a VARCHAR is subject to the
        // maximum row size (65,535 bytes, shared among all columns).
        varchar: Some(65_535),
    };
}
