use crate::errors::{HedgeError, HedgeResult};
use crate::hedge::calendar::TradingCalendar;
use crate::hedge::simulator::ScenarioData;
use crate::state::{OptionContract, PriceBar, PriceSeries};
use chrono::NaiveDate;
use rusqlite::{Connection, OpenFlags, OptionalExtension};
use std::path::Path;

const DATE_FORMAT: &str = "%Y-%m-%d";

/// A stored hedge scenario: which option, which dates, how many sold.
#[derive(Debug, Clone, serde::Serialize)]
pub struct StoredSimulation {
    pub id: i64,
    pub option_id: i64,
    pub start: NaiveDate,
    pub end: NaiveDate,
    pub quantity: f64,
    pub scenario: String,
}

/// Read access to historical prices and stored scenarios.
/// Interval bounds are inclusive; `from = None` means unbounded below.
pub trait MarketData {
    fn simulation(&self, id: i64) -> HedgeResult<StoredSimulation>;
    fn simulation_ids(&self) -> HedgeResult<Vec<i64>>;
    fn option_contract(&self, id: i64) -> HedgeResult<OptionContract>;
    fn option_by_ticker(&self, ticker: &str) -> HedgeResult<OptionContract>;
    fn underlying_series(
        &self,
        asset_id: i64,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> HedgeResult<PriceSeries>;
    fn option_series(
        &self,
        option_id: i64,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> HedgeResult<PriceSeries>;
    fn session_count(&self, asset_id: i64, from: NaiveDate, to: NaiveDate) -> HedgeResult<usize>;
}

/// SQLite-backed store. The connection lives exactly as long as the value.
pub struct SqliteStore {
    conn: Connection,
}

impl SqliteStore {
    pub fn open_read_only(path: &Path) -> HedgeResult<Self> {
        if !path.is_file() {
            return Err(HedgeError::Io(format!("database not found at {}", path.display())));
        }
        let conn = Connection::open_with_flags(
            path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )?;
        tracing::info!("market data store opened read-only at {}", path.display());
        Ok(Self { conn })
    }

    /// Empty store with the bundled schema applied.
    #[cfg(test)]
    pub(crate) fn open_in_memory() -> HedgeResult<Self> {
        let conn = Connection::open_in_memory()?;
        let schema = include_str!("../migrations/001_init.sql");
        conn.execute_batch(schema)?;
        Ok(Self { conn })
    }

    #[cfg(test)]
    pub(crate) fn connection(&self) -> &Connection {
        &self.conn
    }

    fn contract_where(&self, clause: &str, key: &dyn rusqlite::ToSql, label: &str) -> HedgeResult<OptionContract> {
        let sql = format!(
            "SELECT o.id, o.ticker, o.tipo, o.strike, o.vencimento, o.id_ativo, a.ticker
             FROM OPCAO o JOIN ATIVO a ON a.id = o.id_ativo
             WHERE {clause}"
        );
        let row = self
            .conn
            .query_row(&sql, [key], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, String>(2)?,
                    row.get::<_, f64>(3)?,
                    row.get::<_, String>(4)?,
                    row.get::<_, i64>(5)?,
                    row.get::<_, String>(6)?,
                ))
            })
            .optional()?;

        let (id, ticker, kind, strike, expiry, underlying_id, underlying_ticker) = row
            .ok_or_else(|| HedgeError::ConfigurationNotFound(format!("option {label}")))?;

        Ok(OptionContract {
            id,
            ticker: ticker.unwrap_or_else(|| format!("option-{id}")),
            kind: kind.parse()?,
            strike,
            expiry: parse_date(&expiry)?,
            underlying_id,
            underlying_ticker,
        })
    }

    fn series(
        &self,
        table: &str,
        key_column: &str,
        key: i64,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> HedgeResult<PriceSeries> {
        let sql = format!(
            "SELECT data, abertura, fechamento, maximo, minimo FROM {table}
             WHERE {key_column} = ?1 AND (?2 IS NULL OR data >= ?2) AND data <= ?3
             ORDER BY data"
        );
        let mut stmt = self.conn.prepare(&sql)?;
        let rows = stmt
            .query_map(
                rusqlite::params![key, from.map(format_date), format_date(to)],
                |row| {
                    Ok((
                        row.get::<_, String>(0)?,
                        row.get::<_, f64>(1)?,
                        row.get::<_, f64>(2)?,
                        row.get::<_, f64>(3)?,
                        row.get::<_, f64>(4)?,
                    ))
                },
            )?
            .collect::<Result<Vec<_>, _>>()?;

        let bars = rows
            .into_iter()
            .map(|(date, open, close, high, low)| {
                Ok(PriceBar { date: parse_date(&date)?, open, close, high, low })
            })
            .collect::<HedgeResult<Vec<_>>>()?;
        Ok(PriceSeries::new(bars))
    }
}

impl MarketData for SqliteStore {
    fn simulation(&self, id: i64) -> HedgeResult<StoredSimulation> {
        let row = self
            .conn
            .query_row(
                "SELECT id, id_opcao, data_inicio, data_termino, quantidade, cenario
                 FROM SIMULACAO WHERE id = ?1",
                [id],
                |row| {
                    Ok((
                        row.get::<_, i64>(0)?,
                        row.get::<_, i64>(1)?,
                        row.get::<_, String>(2)?,
                        row.get::<_, String>(3)?,
                        row.get::<_, f64>(4)?,
                        row.get::<_, String>(5)?,
                    ))
                },
            )
            .optional()?;

        let (id, option_id, start, end, quantity, scenario) =
            row.ok_or_else(|| HedgeError::ConfigurationNotFound(format!("simulation {id}")))?;

        Ok(StoredSimulation {
            id,
            option_id,
            start: parse_date(&start)?,
            end: parse_date(&end)?,
            quantity,
            scenario,
        })
    }

    fn simulation_ids(&self) -> HedgeResult<Vec<i64>> {
        let mut stmt = self.conn.prepare("SELECT id FROM SIMULACAO ORDER BY id")?;
        let ids = stmt
            .query_map([], |row| row.get(0))?
            .collect::<Result<Vec<i64>, _>>()?;
        Ok(ids)
    }

    fn option_contract(&self, id: i64) -> HedgeResult<OptionContract> {
        self.contract_where("o.id = ?1", &id, &format!("id {id}"))
    }

    fn option_by_ticker(&self, ticker: &str) -> HedgeResult<OptionContract> {
        self.contract_where("o.ticker = ?1", &ticker, &format!("ticker {ticker}"))
    }

    fn underlying_series(
        &self,
        asset_id: i64,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> HedgeResult<PriceSeries> {
        self.series("HIST_ATIVO", "id_ativo", asset_id, from, to)
    }

    fn option_series(
        &self,
        option_id: i64,
        from: Option<NaiveDate>,
        to: NaiveDate,
    ) -> HedgeResult<PriceSeries> {
        self.series("HIST_OPCAO", "id_opcao", option_id, from, to)
    }

    fn session_count(&self, asset_id: i64, from: NaiveDate, to: NaiveDate) -> HedgeResult<usize> {
        let count: i64 = self.conn.query_row(
            "SELECT COUNT(DISTINCT data) FROM HIST_ATIVO
             WHERE id_ativo = ?1 AND data BETWEEN ?2 AND ?3",
            rusqlite::params![asset_id, format_date(from), format_date(to)],
            |row| row.get(0),
        )?;
        Ok(count.max(0) as usize)
    }
}

/// Fetch everything one hedge run reads, before any simulation step runs.
pub fn load_scenario<M: MarketData + ?Sized>(
    store: &M,
    simulation_id: i64,
) -> HedgeResult<(StoredSimulation, ScenarioData)> {
    let stored = store.simulation(simulation_id)?;
    let contract = store.option_contract(stored.option_id)?;

    let underlying = store.underlying_series(contract.underlying_id, Some(stored.start), stored.end)?;
    let option = store.option_series(contract.id, Some(stored.start), stored.end)?;
    let history = store.underlying_series(
        contract.underlying_id,
        None,
        stored.end.max(contract.expiry),
    )?;

    // The in-memory calendar must count the same sessions the store does
    let sessions = store.session_count(contract.underlying_id, stored.start, contract.expiry)?;
    let counted = TradingCalendar::from_series(&history).sessions_between(stored.start, contract.expiry);
    if sessions != counted {
        return Err(HedgeError::SeriesMisalignment(format!(
            "simulation {simulation_id}: store reports {sessions} sessions from {} to {}, loaded history has {counted}",
            stored.start, contract.expiry
        )));
    }

    tracing::debug!(
        simulation_id,
        option = %contract.ticker,
        underlying_days = underlying.len(),
        option_days = option.len(),
        history_days = history.len(),
        sessions_to_expiry = sessions.saturating_sub(1),
        "scenario loaded"
    );

    Ok((stored, ScenarioData { contract, underlying, option, history }))
}

fn parse_date(raw: &str) -> HedgeResult<NaiveDate> {
    // Tolerate a trailing time component ("2024-01-02 00:00:00")
    let day = raw.get(..10).unwrap_or(raw);
    Ok(NaiveDate::parse_from_str(day, DATE_FORMAT)?)
}

fn format_date(date: NaiveDate) -> String {
    date.format(DATE_FORMAT).to_string()
}
