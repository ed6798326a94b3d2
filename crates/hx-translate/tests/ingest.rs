//! File-based ingestion: panel merge + coefficient tables read from disk.

use std::path::PathBuf;
use std::time::{SystemTime, UNIX_EPOCH};

use hx_core::{HubBin, MarketKey};
use hx_translate::{load_observations, read_coefficients, read_covariance};

fn tmp_path(filename: &str) -> PathBuf {
    let nanos = SystemTime::now().duration_since(UNIX_EPOCH).unwrap().as_nanos();
    let mut p = std::env::temp_dir();
    p.push(format!("hubext_ingest_{}_{}_{}", std::process::id(), nanos, filename));
    p
}

fn write(filename: &str, contents: &str) -> PathBuf {
    let p = tmp_path(filename);
    std::fs::write(&p, contents).unwrap();
    p
}

#[test]
fn load_observations_from_two_csv_files() {
    let airline = write(
        "airline.csv",
        "OriginAirportID,Year,Month,MarketShare,HubSize,MonthlyFlights\n\
         10397,2019,3,0.55,3,4200\n\
         10397,2019,3,0.30,1,2300\n\
         10397,2019,3,0.15,0,1100\n\
         11298,2019,3,1.00,2,900\n",
    );
    let airport = write(
        "airport.csv",
        "OriginAirportID,Year,Month,HHI,HubSize\n\
         11298,2019,3,1.0,2\n\
         10397,2019,3,0.415,3\n",
    );

    let obs = load_observations(&airline, &airport).unwrap();
    assert_eq!(obs.len(), 4);
    assert!(obs[..3].iter().all(|o| o.market == MarketKey::new(10397, 2019, 3)));
    assert!(obs[..3].iter().all(|o| (o.hhi - 0.415).abs() < 1e-12));
    assert!(obs[..3].iter().all(|o| o.airport_hub_size == HubBin::Large));
    assert_eq!(obs[1].airline_hub_size, HubBin::Small);
    assert_eq!(obs[3].monthly_flights, 900.0);

    let _ = std::fs::remove_file(&airline);
    let _ = std::fs::remove_file(&airport);
}

#[test]
fn hub_decomposed_coefficients_from_disk() {
    let names = [
        "nonhubairlineconcorigin",
        "smallhubairlineconcorigin",
        "mediumhubairlineconcorigin",
        "largehubairlineconcorigin",
        "nonhubairlineconcdest",
        "smallhubairlineconcdest",
        "mediumhubairlineconcdest",
        "largehubairlineconcdest",
    ];
    let coef = write(
        "coef.csv",
        &format!("{}\n{}\n", names.join(","), (1..=8).map(|i| i.to_string()).collect::<Vec<_>>().join(",")),
    );

    let mut cov = format!(",{}\n", names.join(","));
    for (i, n) in names.iter().enumerate() {
        let row: Vec<String> =
            (0..8).map(|j| if i == j { "0.5".to_string() } else { "0".to_string() }).collect();
        cov.push_str(&format!("{n},{}\n", row.join(",")));
    }
    let cov_path = write("cov.csv", &cov);

    let mu = read_coefficients(&coef, &names).unwrap();
    assert_eq!(mu.len(), 8);
    assert_eq!(mu[7], 8.0);

    let sigma = read_covariance(&cov_path, &names).unwrap();
    assert_eq!(sigma.shape(), (8, 8));
    assert_eq!(sigma[(3, 3)], 0.5);
    assert_eq!(sigma[(3, 4)], 0.0);

    let _ = std::fs::remove_file(&coef);
    let _ = std::fs::remove_file(&cov_path);
}

#[test]
fn missing_file_is_an_io_error() {
    let missing = tmp_path("nope.csv");
    assert!(matches!(read_coefficients(&missing, &["hhiorigin"]), Err(hx_core::Error::Io(_))));
}
