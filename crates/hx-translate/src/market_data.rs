//! Airport-airline market panels.
//!
//! The extraction pipeline exports two tables:
//!
//! - airline-market rows: `OriginAirportID, Year, Month, MarketShare, HubSize, MonthlyFlights`
//! - airport-market rows: `OriginAirportID, Year, Month, HHI, HubSize`
//!
//! [`load_market_panel`] joins them many-to-one on the market key, renames the
//! two `HubSize` fields, and appends the one-hot airline hub columns.
//! [`observations_from_table`] maps a merged table onto [`AirlineObservation`]s.

use std::collections::HashMap;
use std::path::Path;

use hx_core::{AirlineObservation, Error, HubBin, HubDummy, MarketKey, N_HUB_BINS, Result};

use crate::table::Table;

/// Column names used to map a table onto observations.
#[derive(Debug, Clone)]
pub struct ObservationColumns {
    /// Market key columns: airport, year, month. The first one is the market identifier.
    pub group_keys: [String; 3],
    /// Airline market share.
    pub market_share: String,
    /// Market HHI.
    pub hhi: String,
    /// Airline monthly departures.
    pub monthly_flights: String,
    /// Airport hub category.
    pub airport_hub_size: String,
    /// Airline hub category. Optional in the input; derived from the dummies when absent.
    pub airline_hub_size: String,
    /// One-hot airline hub columns, in bin order.
    pub hub_dummies: [String; N_HUB_BINS],
}

impl Default for ObservationColumns {
    fn default() -> Self {
        Self {
            group_keys: ["OriginAirportID".into(), "Year".into(), "Month".into()],
            market_share: "MarketShare".into(),
            hhi: "HHI".into(),
            monthly_flights: "MonthlyFlights".into(),
            airport_hub_size: "AirportHubSize".into(),
            airline_hub_size: "AirlineHubSize".into(),
            hub_dummies: std::array::from_fn(|b| format!("AirlineHubSize_{b}")),
        }
    }
}

impl ObservationColumns {
    /// Columns that must be present in the input table.
    pub fn required(&self) -> Vec<&str> {
        let mut out: Vec<&str> = self.group_keys.iter().map(String::as_str).collect();
        out.extend([
            self.market_share.as_str(),
            self.hhi.as_str(),
            self.monthly_flights.as_str(),
            self.airport_hub_size.as_str(),
        ]);
        out.extend(self.hub_dummies.iter().map(String::as_str));
        out
    }
}

const KEY_COLS: [&str; 3] = ["OriginAirportID", "Year", "Month"];

fn market_keys(table: &Table) -> Result<Vec<MarketKey>> {
    let airports = table.i64_column(KEY_COLS[0])?;
    let years = table.i64_column(KEY_COLS[1])?;
    let months = table.i64_column(KEY_COLS[2])?;
    airports
        .iter()
        .zip(&years)
        .zip(&months)
        .enumerate()
        .map(|(i, ((&a, &y), &m))| market_key(table.name(), i, a, y, m))
        .collect()
}

fn market_key(table: &str, row: usize, airport: i64, year: i64, month: i64) -> Result<MarketKey> {
    let year = i32::try_from(year)
        .map_err(|_| Error::Validation(format!("{table}: row {row}: year {year} out of range")))?;
    if !(1..=12).contains(&month) {
        return Err(Error::Validation(format!("{table}: row {row}: month {month} out of range")));
    }
    Ok(MarketKey::new(airport, year, month as u8))
}

/// Many-to-one left join of airline-market rows onto airport-market rows.
///
/// Output columns: `OriginAirportID, Year, Month, MarketShare, AirlineHubSize,
/// MonthlyFlights, HHI, AirportHubSize, AirlineHubSize_0..3`.
///
/// A key that appears twice in the airport table violates the m:1 contract
/// and fails. An airline row without a matching airport row also fails,
/// since its HHI would be missing downstream.
pub fn merge_market_tables(airline: &Table, airport: &Table) -> Result<Table> {
    airline.require(&["OriginAirportID", "Year", "Month", "MarketShare", "HubSize", "MonthlyFlights"])?;
    airport.require(&["OriginAirportID", "Year", "Month", "HHI", "HubSize"])?;

    let airport_keys = market_keys(airport)?;
    let hhi_cells = airport.column("HHI")?;
    let airport_hub_cells = airport.column("HubSize")?;

    let mut by_key: HashMap<MarketKey, usize> = HashMap::with_capacity(airport_keys.len());
    for (row, key) in airport_keys.iter().enumerate() {
        if by_key.insert(*key, row).is_some() {
            return Err(Error::Validation(format!(
                "{}: duplicate airport-market key {key:?} (expected one row per market)",
                airport.name()
            )));
        }
    }

    let airline_keys = market_keys(airline)?;
    let airline_hub = airline.f64_column("HubSize")?;

    let n = airline.n_rows();
    let mut hhi = Vec::with_capacity(n);
    let mut airport_hub = Vec::with_capacity(n);
    let mut dummies: [Vec<String>; N_HUB_BINS] = std::array::from_fn(|_| Vec::with_capacity(n));

    for (i, key) in airline_keys.iter().enumerate() {
        let j = by_key.get(key).copied().ok_or_else(|| {
            Error::Validation(format!(
                "{}: row {i}: no airport-market row for {key:?} in {}",
                airline.name(),
                airport.name()
            ))
        })?;
        hhi.push(hhi_cells[j].clone());
        airport_hub.push(airport_hub_cells[j].clone());

        let bin = HubBin::from_f64(airline_hub[i])?;
        for (b, col) in dummies.iter_mut().enumerate() {
            col.push(if b == bin.index() { "1" } else { "0" }.to_string());
        }
    }

    let mut cols: Vec<(String, Vec<String>)> = Vec::with_capacity(8 + N_HUB_BINS);
    for name in ["OriginAirportID", "Year", "Month", "MarketShare"] {
        cols.push((name.to_string(), airline.column(name)?.to_vec()));
    }
    cols.push(("AirlineHubSize".to_string(), airline.column("HubSize")?.to_vec()));
    cols.push(("MonthlyFlights".to_string(), airline.column("MonthlyFlights")?.to_vec()));
    cols.push(("HHI".to_string(), hhi));
    cols.push(("AirportHubSize".to_string(), airport_hub));
    for (b, col) in dummies.into_iter().enumerate() {
        cols.push((format!("AirlineHubSize_{b}"), col));
    }

    log::debug!("merged {} airline rows onto {} airport markets", n, by_key.len());
    Table::from_columns(format!("{} + {}", airline.name(), airport.name()), cols)
}

/// Read both market tables from disk and merge them.
pub fn load_market_panel(airline_csv: &Path, airport_csv: &Path) -> Result<Table> {
    let airline = Table::from_path(airline_csv)?;
    let airport = Table::from_path(airport_csv)?;
    merge_market_tables(&airline, &airport)
}

/// Map a merged panel onto observations using `cols`.
///
/// All required columns are checked up front and reported together.
pub fn observations_from_table(
    table: &Table,
    cols: &ObservationColumns,
) -> Result<Vec<AirlineObservation>> {
    table.require(&cols.required())?;

    let ids = table.i64_column(&cols.group_keys[0])?;
    let years = table.i64_column(&cols.group_keys[1])?;
    let months = table.i64_column(&cols.group_keys[2])?;
    let share = table.f64_column(&cols.market_share)?;
    let hhi = table.f64_column(&cols.hhi)?;
    let flights = table.f64_column(&cols.monthly_flights)?;
    let airport_hub = table.f64_column(&cols.airport_hub_size)?;
    let airline_hub = if table.has_column(&cols.airline_hub_size) {
        Some(table.f64_column(&cols.airline_hub_size)?)
    } else {
        None
    };
    let dummy_cols = cols
        .hub_dummies
        .iter()
        .map(|c| table.f64_column(c))
        .collect::<Result<Vec<_>>>()?;

    let mut out = Vec::with_capacity(table.n_rows());
    for i in 0..table.n_rows() {
        let market = market_key(table.name(), i, ids[i], years[i], months[i])?;
        let hub_dummy = HubDummy(std::array::from_fn(|b| dummy_cols[b][i]));
        let airline_hub_size = match &airline_hub {
            Some(v) => HubBin::from_f64(v[i])?,
            None => bin_from_dummy(&hub_dummy).ok_or_else(|| {
                Error::Validation(format!(
                    "{}: row {i}: hub dummies {:?} are not one-hot and '{}' is absent",
                    table.name(),
                    hub_dummy.values(),
                    cols.airline_hub_size
                ))
            })?,
        };
        out.push(AirlineObservation {
            market,
            market_id: ids[i],
            market_share: share[i],
            hhi: hhi[i],
            monthly_flights: flights[i],
            airport_hub_size: HubBin::from_f64(airport_hub[i])?,
            airline_hub_size,
            hub_dummy,
        });
    }
    Ok(out)
}

fn bin_from_dummy(d: &HubDummy) -> Option<HubBin> {
    let ones: Vec<usize> = (0..N_HUB_BINS).filter(|&b| d.values()[b] == 1.0).collect();
    let zeros = d.values().iter().filter(|&&v| v == 0.0).count();
    match ones.as_slice() {
        [b] if zeros == N_HUB_BINS - 1 => Some(HubBin::ALL[*b]),
        _ => None,
    }
}

/// Load, merge and map both market tables with the default column names.
pub fn load_observations(airline_csv: &Path, airport_csv: &Path) -> Result<Vec<AirlineObservation>> {
    let panel = load_market_panel(airline_csv, airport_csv)?;
    observations_from_table(&panel, &ObservationColumns::default())
}
