use super::*;
use rust_decimal::Decimal;
use std::str::FromStr;

use gold_rate_watcher::chart::TrendRenderer;
use gold_rate_watcher::history::HistoryStore;
use gold_rate_watcher::Observation;

fn obs(date: &str, price: &str) -> Observation {
    Observation::new(date.parse().unwrap(), Decimal::from_str(price).unwrap())
}

#[test]
fn test_history_survives_separate_store_instances() {
    let workspace = Workspace::new();

    CsvHistoryStore::new(workspace.history_path())
        .append(&obs("2024-01-01", "10100"))
        .unwrap();
    CsvHistoryStore::new(workspace.history_path())
        .append(&obs("2024-01-02", "10190.50"))
        .unwrap();

    let series = CsvHistoryStore::new(workspace.history_path()).load().unwrap();
    let observations: Vec<_> = series.iter().cloned().collect();
    assert_eq!(
        observations,
        vec![obs("2024-01-01", "10100"), obs("2024-01-02", "10190.50")]
    );
}

#[test]
fn test_hand_edited_history_is_tolerated() {
    let workspace = Workspace::new();
    workspace.seed_history(
        "date,price\n\
         2024-01-01, 10100\n\
         not-a-date,123\n\
         2024-01-03,10150\n\
         2024-01-04\n\
         2024-01-05,10300\n",
    );

    let series = CsvHistoryStore::new(workspace.history_path()).load().unwrap();
    let dates: Vec<String> = series.iter().map(|o| o.date.to_string()).collect();
    assert_eq!(dates, vec!["2024-01-01", "2024-01-03", "2024-01-05"]);
}

#[test]
fn test_chart_drawn_from_stored_history() {
    let workspace = Workspace::new();
    let store = CsvHistoryStore::new(workspace.history_path());
    for (date, price) in [("2024-01-01", "10100"), ("2024-01-03", "10190"), ("2024-01-02", "10050")] {
        store.append(&obs(date, price)).unwrap();
    }

    let series = store.load().unwrap();
    let path = ChartRenderer::with_size(workspace.chart_path(), 320, 160)
        .render(&series)
        .unwrap()
        .expect("three points are enough for a chart");

    let image = image::open(path).unwrap();
    assert_eq!((image.width(), image.height()), (320, 160));
}
