//! SQLite storage layer for transactions, accounts, contracts and withdrawals.
//!
//! Uses WAL mode for concurrent read performance and prepared statements
//! for batch insert throughput. The connection sits behind a mutex so the
//! store can be shared between the call queue and read paths.

use std::sync::{Mutex, MutexGuard};

use alloy::primitives::{hex, Address, Bytes, B256, U256};
use eyre::{bail, ensure, eyre, Context, Result};
use rusqlite::types::Value;
use rusqlite::{params, params_from_iter, Connection, OptionalExtension};

use crate::traits::DataStore;
use crate::types::{
    Account, AccountType, Contract, Transaction, WithdrawFilter, WithdrawRequest,
    WithdrawRequestList,
};

/// Row counts reported by [`Store::counts`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct StoreCounts {
    /// All stored transactions.
    pub transactions: u64,
    /// Transactions with a decoded call target.
    pub classified: u64,
    /// Known accounts.
    pub accounts: u64,
    /// Tracked contracts.
    pub contracts: u64,
    /// Withdrawal requests.
    pub withdraw_requests: u64,
}

pub struct Store {
    conn: Mutex<Connection>,
}

type TransactionRow = (
    String,
    Option<u64>,
    String,
    Option<String>,
    String,
    Option<String>,
    Option<String>,
    bool,
);

type WithdrawRow = (i64, String, String, String, String, u64, Option<u64>);

const TRANSACTION_COLUMNS: &str = "hash, block_number, from_address, to_address, input_data, \
     target_contract_type, target_function_call, is_erc20_call";

const WITHDRAW_COLUMNS: &str =
    "seq, request_id, address, staker_id, amount, created_time, withdraw_time";

impl Store {
    /// Creates or opens a SQLite database with WAL mode enabled.
    ///
    /// # Errors
    /// Returns error if the database cannot be opened or migrations fail.
    pub fn new(path: &str) -> Result<Self> {
        let conn = Connection::open(path)
            .wrap_err_with(|| format!("failed to open SQLite database at {}", path))?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA foreign_keys=ON;")?;
        let store = Self {
            conn: Mutex::new(conn),
        };
        store.run_migrations()?;
        Ok(store)
    }

    fn conn(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|_| eyre!("store connection lock poisoned"))
    }

    fn run_migrations(&self) -> Result<()> {
        self.conn()?.execute_batch(
            "
            CREATE TABLE IF NOT EXISTS transactions (
                hash TEXT PRIMARY KEY,
                block_number INTEGER,
                from_address TEXT NOT NULL,
                to_address TEXT,
                input_data TEXT NOT NULL,
                target_contract_type TEXT,
                target_function_call TEXT,
                is_erc20_call INTEGER NOT NULL DEFAULT 0
            );

            CREATE TABLE IF NOT EXISTS accounts (
                address TEXT PRIMARY KEY,
                account_type TEXT NOT NULL
            );

            CREATE TABLE IF NOT EXISTS contracts (
                address TEXT PRIMARY KEY,
                contract_type TEXT NOT NULL,
                abi TEXT
            );

            CREATE TABLE IF NOT EXISTS withdraw_requests (
                seq INTEGER PRIMARY KEY AUTOINCREMENT,
                request_id TEXT NOT NULL,
                address TEXT NOT NULL,
                staker_id TEXT NOT NULL,
                amount TEXT NOT NULL,
                created_time INTEGER NOT NULL,
                withdraw_time INTEGER,
                UNIQUE (address, staker_id, request_id)
            );

            CREATE INDEX IF NOT EXISTS idx_withdraw_requests_owner
                ON withdraw_requests (address, staker_id);
            ",
        )?;
        Ok(())
    }

    /// Batch insert transactions; already known hashes are left untouched.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_transactions(&self, txs: &[Transaction]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO transactions (
                    hash, block_number, from_address, to_address, input_data,
                    target_contract_type, target_function_call, is_erc20_call
                ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
                ",
            )?;

            for t in txs {
                inserted += stmt.execute(params![
                    hex::encode_prefixed(t.hash),
                    t.block_number,
                    hex::encode_prefixed(t.from),
                    t.to.map(hex::encode_prefixed),
                    hex::encode_prefixed(&t.input),
                    t.target_contract_type.map(AccountType::as_str),
                    t.target_function_call,
                    t.is_erc20_call,
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Insert or replace an account record.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_account(&self, account: &Account) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO accounts (address, account_type) VALUES (?, ?)",
            params![
                hex::encode_prefixed(account.address),
                account.account_type.as_str()
            ],
        )?;
        Ok(())
    }

    /// Insert or replace a contract record.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_contract(&self, contract: &Contract) -> Result<()> {
        self.conn()?.execute(
            "INSERT OR REPLACE INTO contracts (address, contract_type, abi) VALUES (?, ?, ?)",
            params![
                hex::encode_prefixed(contract.address),
                contract.contract_type,
                contract.abi,
            ],
        )?;
        Ok(())
    }

    /// Batch insert withdrawal requests in creation order.
    ///
    /// # Errors
    /// Returns error if database insert fails.
    pub fn insert_withdraw_requests(&self, requests: &[WithdrawRequest]) -> Result<usize> {
        let mut conn = self.conn()?;
        let tx = conn.transaction()?;
        let mut inserted = 0;
        {
            let mut stmt = tx.prepare(
                "
                INSERT OR IGNORE INTO withdraw_requests (
                    request_id, address, staker_id, amount, created_time, withdraw_time
                ) VALUES (?, ?, ?, ?, ?, ?)
                ",
            )?;

            for r in requests {
                inserted += stmt.execute(params![
                    format!("{:#x}", r.request_id),
                    hex::encode_prefixed(r.address),
                    format!("{:#x}", r.staker_id),
                    format!("{:#x}", r.amount),
                    r.created_time,
                    r.withdraw_time,
                ])?;
            }
        }

        tx.commit()?;
        Ok(inserted)
    }

    /// Load a single transaction by hash.
    ///
    /// # Errors
    /// Returns error if the query fails or the stored row is malformed.
    pub fn transaction(&self, hash: &B256) -> Result<Option<Transaction>> {
        let row = self
            .conn()?
            .query_row(
                &format!("SELECT {TRANSACTION_COLUMNS} FROM transactions WHERE hash = ?"),
                params![hex::encode_prefixed(hash)],
                read_transaction_row,
            )
            .optional()?;

        row.map(transaction_from_row).transpose()
    }

    /// Loads transactions that look like contract calls and were not classified yet.
    ///
    /// # Errors
    /// Returns error if the query fails or a stored row is malformed.
    pub fn unclassified_calls(&self, limit: usize) -> Result<Vec<Transaction>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(&format!(
            "
            SELECT {TRANSACTION_COLUMNS} FROM transactions
            WHERE to_address IS NOT NULL
              AND length(input_data) >= 10
              AND target_function_call IS NULL
            ORDER BY block_number, hash
            LIMIT ?
            "
        ))?;

        let rows = stmt
            .query_map(params![limit as i64], read_transaction_row)?
            .collect::<Result<Vec<_>, _>>()?;

        rows.into_iter().map(transaction_from_row).collect()
    }

    /// Row counts of all tables.
    ///
    /// # Errors
    /// Returns error if any count query fails.
    pub fn counts(&self) -> Result<StoreCounts> {
        let conn = self.conn()?;
        let count = |sql: &str| -> Result<u64> {
            conn.query_row(sql, [], |row| row.get(0))
                .wrap_err_with(|| format!("count query failed: {}", sql))
        };

        Ok(StoreCounts {
            transactions: count("SELECT COUNT(*) FROM transactions")?,
            classified: count(
                "SELECT COUNT(*) FROM transactions WHERE target_function_call IS NOT NULL",
            )?,
            accounts: count("SELECT COUNT(*) FROM accounts")?,
            contracts: count("SELECT COUNT(*) FROM contracts")?,
            withdraw_requests: count("SELECT COUNT(*) FROM withdraw_requests")?,
        })
    }
}

impl DataStore for Store {
    fn account(&self, address: &Address) -> Result<Option<Account>> {
        let tag: Option<String> = self
            .conn()?
            .query_row(
                "SELECT account_type FROM accounts WHERE address = ?",
                params![hex::encode_prefixed(address)],
                |row| row.get(0),
            )
            .optional()?;

        Ok(tag.map(|tag| Account {
            address: *address,
            account_type: AccountType::from_tag(&tag),
        }))
    }

    fn contract(&self, address: &Address) -> Result<Option<Contract>> {
        let row: Option<(String, Option<String>)> = self
            .conn()?
            .query_row(
                "SELECT contract_type, abi FROM contracts WHERE address = ?",
                params![hex::encode_prefixed(address)],
                |row| Ok((row.get(0)?, row.get(1)?)),
            )
            .optional()?;

        Ok(row.map(|(contract_type, abi)| Contract {
            address: *address,
            contract_type,
            abi: abi.filter(|abi| !abi.is_empty()),
        }))
    }

    fn update_transaction(&self, trx: &Transaction) -> Result<()> {
        let updated = self.conn()?.execute(
            "
            UPDATE transactions
            SET target_contract_type = ?, target_function_call = ?, is_erc20_call = ?
            WHERE hash = ?
            ",
            params![
                trx.target_contract_type.map(AccountType::as_str),
                trx.target_function_call,
                trx.is_erc20_call,
                hex::encode_prefixed(trx.hash),
            ],
        )?;

        if updated == 0 {
            bail!("transaction {} not found in store", trx.hash);
        }
        Ok(())
    }

    fn withdrawals(
        &self,
        filter: &WithdrawFilter,
        cursor: Option<&str>,
        count: i32,
    ) -> Result<WithdrawRequestList> {
        ensure!(count != 0, "withdrawal page size must not be zero");

        let mut filter_sql = String::from("address = ?");
        let mut filter_args = vec![Value::Text(hex::encode_prefixed(filter.address))];
        if let Some(staker_id) = filter.staker_id {
            filter_sql.push_str(" AND staker_id = ?");
            filter_args.push(Value::Text(format!("{:#x}", staker_id)));
        }

        let conn = self.conn()?;
        let total: u64 = conn.query_row(
            &format!("SELECT COUNT(*) FROM withdraw_requests WHERE {filter_sql}"),
            params_from_iter(filter_args.iter()),
            |row| row.get(0),
        )?;

        let forward = count > 0;
        let mut page_sql =
            format!("SELECT {WITHDRAW_COLUMNS} FROM withdraw_requests WHERE {filter_sql}");
        let mut page_args = filter_args.clone();
        if let Some(cursor) = cursor {
            page_sql.push_str(if forward { " AND seq < ?" } else { " AND seq > ?" });
            page_args.push(Value::Integer(parse_cursor(cursor)?));
        }
        page_sql.push_str(if forward {
            " ORDER BY seq DESC LIMIT ?"
        } else {
            " ORDER BY seq ASC LIMIT ?"
        });
        page_args.push(Value::Integer(i64::from(count.unsigned_abs())));

        let mut stmt = conn.prepare(&page_sql)?;
        let mut rows = stmt
            .query_map(params_from_iter(page_args.iter()), |row| {
                Ok((
                    row.get(0)?,
                    row.get(1)?,
                    row.get(2)?,
                    row.get(3)?,
                    row.get(4)?,
                    row.get(5)?,
                    row.get(6)?,
                ))
            })?
            .collect::<Result<Vec<WithdrawRow>, _>>()?;
        if !forward {
            rows.reverse();
        }

        let (first_seq, last_seq) = match (rows.first(), rows.last()) {
            (Some(first), Some(last)) => (first.0, last.0),
            _ => {
                return Ok(WithdrawRequestList {
                    total,
                    is_start: !forward || cursor.is_none(),
                    is_end: forward || cursor.is_none(),
                    ..WithdrawRequestList::default()
                })
            }
        };

        let exists = |cmp: &str, seq: i64| -> Result<bool> {
            let mut args = filter_args.clone();
            args.push(Value::Integer(seq));
            let found: bool = conn.query_row(
                &format!(
                    "SELECT EXISTS (SELECT 1 FROM withdraw_requests \
                     WHERE {filter_sql} AND seq {cmp} ?)"
                ),
                params_from_iter(args.iter()),
                |row| row.get(0),
            )?;
            Ok(found)
        };
        let is_start = !exists(">", first_seq)?;
        let is_end = !exists("<", last_seq)?;

        let items = rows
            .into_iter()
            .map(withdraw_from_row)
            .collect::<Result<Vec<_>>>()?;

        Ok(WithdrawRequestList {
            items,
            total,
            first: Some(format_cursor(first_seq)),
            last: Some(format_cursor(last_seq)),
            is_start,
            is_end,
        })
    }
}

fn format_cursor(seq: i64) -> String {
    format!("{:#x}", seq)
}

fn parse_cursor(cursor: &str) -> Result<i64> {
    let digits = cursor.strip_prefix("0x").unwrap_or(cursor);
    i64::from_str_radix(digits, 16).wrap_err_with(|| format!("invalid cursor {}", cursor))
}

fn read_transaction_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TransactionRow> {
    Ok((
        row.get(0)?,
        row.get(1)?,
        row.get(2)?,
        row.get(3)?,
        row.get(4)?,
        row.get(5)?,
        row.get(6)?,
        row.get(7)?,
    ))
}

fn transaction_from_row(row: TransactionRow) -> Result<Transaction> {
    let (hash, block_number, from, to, input, contract_type, function_call, is_erc20_call) = row;
    Ok(Transaction {
        hash: hash
            .parse::<B256>()
            .wrap_err_with(|| format!("malformed transaction hash {}", hash))?,
        block_number,
        from: parse_address(&from)?,
        to: to.as_deref().map(parse_address).transpose()?,
        input: Bytes::from(
            hex::decode(&input).wrap_err_with(|| format!("malformed input data of {}", hash))?,
        ),
        target_contract_type: contract_type.as_deref().map(AccountType::from_tag),
        target_function_call: function_call,
        is_erc20_call,
    })
}

fn withdraw_from_row(row: WithdrawRow) -> Result<WithdrawRequest> {
    let (_, request_id, address, staker_id, amount, created_time, withdraw_time) = row;
    Ok(WithdrawRequest {
        request_id: parse_u256(&request_id)?,
        address: parse_address(&address)?,
        staker_id: parse_u256(&staker_id)?,
        amount: parse_u256(&amount)?,
        created_time,
        withdraw_time,
    })
}

fn parse_address(value: &str) -> Result<Address> {
    value
        .parse::<Address>()
        .wrap_err_with(|| format!("malformed address {}", value))
}

fn parse_u256(value: &str) -> Result<U256> {
    value
        .parse::<U256>()
        .wrap_err_with(|| format!("malformed numeric value {}", value))
}
