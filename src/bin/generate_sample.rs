use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result, bail};
use arrow::array::{Float64Array, Float64Builder, ListBuilder};
use arrow::datatypes::{DataType, Field, Schema};
use arrow::record_batch::RecordBatch;
use clap::Parser;
use log::{info, warn};
use parquet::arrow::ArrowWriter;

use rusty_ecg::data::loader::load_file;
use rusty_ecg::data::model::{BeatType, DatasetSummary, EcgDataset, Sample};
use rusty_ecg::inference::network::{ConvNet, ModelArtifact};
use rusty_ecg::inference::rng::SimpleRng;

/// Samples per beat in the MIT-BIH heartbeat extracts.
const SIGNAL_LEN: usize = 187;

fn gaussian(x: f64, mu: f64, sigma: f64, amplitude: f64) -> f64 {
    amplitude * (-(x - mu).powi(2) / (2.0 * sigma.powi(2))).exp()
}

/// Scale `v` by about ±5%.
fn jitter(rng: &mut SimpleRng, v: f64) -> f64 {
    v * (1.0 + rng.gauss(0.0, 0.05))
}

/// `(centre, width, amplitude)` of the P, Q, R, S and T waves for a beat type,
/// on a time axis where the R peak sits near sample 10.
fn waves(beat: BeatType, rng: &mut SimpleRng) -> Vec<(f64, f64, f64)> {
    match beat {
        BeatType::Normal => vec![
            (jitter(rng, 150.0), 6.0, 0.12),
            (8.0, 1.5, -0.10),
            (10.0, 2.0, 1.00),
            (13.0, 1.8, -0.25),
            (jitter(rng, 55.0), 9.0, 0.30),
        ],
        BeatType::SupraventricularPremature => vec![
            (jitter(rng, 110.0), 5.0, 0.18),
            (8.0, 1.5, -0.08),
            (10.0, 2.0, 0.95),
            (13.0, 1.8, -0.20),
            (jitter(rng, 45.0), 8.0, 0.25),
        ],
        BeatType::PrematureVentricular => vec![
            (10.0, 6.0, 1.00),
            (22.0, 7.0, -0.45),
            (jitter(rng, 60.0), 12.0, -0.30),
        ],
        BeatType::Fusion => vec![
            (jitter(rng, 140.0), 6.0, 0.08),
            (10.0, 4.0, 0.90),
            (17.0, 4.0, -0.35),
            (jitter(rng, 58.0), 10.0, 0.10),
        ],
        BeatType::Unknown | BeatType::Unclassified => vec![
            (10.0, 3.0, 0.80),
            (jitter(rng, 30.0), 5.0, 0.40),
            (jitter(rng, 90.0), 15.0, 0.20),
        ],
    }
}

/// One beat scaled to `[0, 1]` and zero-padded after a random cut, like the
/// preprocessed MIT-BIH rows.
fn generate_beat(beat: BeatType, rng: &mut SimpleRng) -> Vec<f64> {
    let waves = waves(beat, rng);
    let raw: Vec<f64> = (0..SIGNAL_LEN)
        .map(|t| {
            let t = t as f64;
            let signal: f64 = waves
                .iter()
                .map(|&(mu, sigma, amp)| gaussian(t, mu, sigma, amp))
                .sum();
            signal + rng.gauss(0.0, 0.01)
        })
        .collect();

    let min = raw.iter().copied().fold(f64::INFINITY, f64::min);
    let max = raw.iter().copied().fold(f64::NEG_INFINITY, f64::max);
    let range = (max - min).max(f64::EPSILON);
    let cut = 100 + (rng.next_u64() % (SIGNAL_LEN as u64 - 100)) as usize;

    raw.iter()
        .enumerate()
        .map(|(t, &v)| if t < cut { (v - min) / range } else { 0.0 })
        .collect()
}

/// Create a class-balanced ECG sample dataset and a matching model artifact.
///
/// With `--input` the rows are drawn from an MIT-BIH training CSV; otherwise
/// heartbeats are synthesized per beat type.
#[derive(Parser, Debug)]
#[command(name = "generate_sample")]
#[command(about = "Create a class-balanced ECG sample dataset", long_about = None)]
struct Args {
    /// Total number of heartbeats to write
    #[arg(long, default_value_t = 100, value_parser = clap::value_parser!(u64).range(1..))]
    samples: u64,

    /// Labels to include, e.g. `--labels 0 2 4` (default: every available label)
    #[arg(long, num_args = 1.., value_name = "LABEL", allow_negative_numbers = true)]
    labels: Option<Vec<f64>>,

    /// MIT-BIH training CSV to sample rows from
    #[arg(long)]
    input: Option<PathBuf>,

    /// Print the label counts of `--input` and exit
    #[arg(long, requires = "input")]
    show_labels: bool,

    /// Output CSV; a Parquet copy is written next to it
    #[arg(long, default_value = "sample_mitbih.csv")]
    output: PathBuf,

    /// Model artifact path
    #[arg(long, default_value = "ecg_model.json")]
    model: PathBuf,

    /// Seed for sampling, shuffling and model weights
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

/// Label codes of the MIT-BIH heartbeat categories.
const BEAT_LABELS: [f64; 5] = [0.0, 1.0, 2.0, 3.0, 4.0];

// ---------------------------------------------------------------------------
// Balanced selection
// ---------------------------------------------------------------------------

/// Split `total` over `n` labels; the first `total % n` labels get one extra.
fn balanced_counts(total: usize, n: usize) -> Vec<usize> {
    if n == 0 {
        return Vec::new();
    }
    (0..n).map(|i| total / n + usize::from(i < total % n)).collect()
}

/// The requested labels that are present in `available`, or all of them.
fn target_labels(requested: Option<&[f64]>, available: &[f64]) -> Result<Vec<f64>> {
    let Some(requested) = requested else {
        return Ok(available.to_vec());
    };
    let labels: Vec<f64> = requested
        .iter()
        .copied()
        .filter(|l| available.iter().any(|a| a.total_cmp(l).is_eq()))
        .collect();
    if labels.is_empty() {
        bail!("none of the labels {requested:?} are available (have {available:?})");
    }
    Ok(labels)
}

/// Fisher-Yates shuffle so classes are interleaved.
fn shuffle<T>(items: &mut [T], rng: &mut SimpleRng) {
    for i in (1..items.len()).rev() {
        let j = (rng.next_u64() % (i as u64 + 1)) as usize;
        items.swap(i, j);
    }
}

/// Draw `total` rows from `dataset`, balanced over `labels`.
///
/// A label with fewer rows than its share contributes all of them.
fn sample_from_dataset(
    dataset: &EcgDataset,
    labels: &[f64],
    total: usize,
    rng: &mut SimpleRng,
) -> Vec<(Vec<f64>, f64)> {
    let mut rows = Vec::with_capacity(total);
    for (&label, count) in labels.iter().zip(balanced_counts(total, labels.len())) {
        let mut candidates: Vec<&Sample> = dataset
            .samples()
            .iter()
            .filter(|s| s.label.total_cmp(&label).is_eq())
            .collect();
        if candidates.len() < count {
            warn!(
                "Only {} samples available for label {label:?}, {count} requested",
                candidates.len()
            );
        } else {
            shuffle(&mut candidates, rng);
            candidates.truncate(count);
        }
        info!("Label {label:?}: {} samples", candidates.len());
        rows.extend(candidates.into_iter().map(|s| (s.signal.clone(), s.label)));
    }
    rows
}

/// Synthesize `total` beats, balanced over `labels`.
fn synthesize(labels: &[f64], total: usize, rng: &mut SimpleRng) -> Vec<(Vec<f64>, f64)> {
    let mut rows = Vec::with_capacity(total);
    for (&label, count) in labels.iter().zip(balanced_counts(total, labels.len())) {
        let beat = BeatType::from_label(label);
        for _ in 0..count {
            rows.push((generate_beat(beat, rng), label));
        }
        info!("Label {label:?} ({beat}): {count} samples");
    }
    rows
}

fn print_label_counts(summary: &DatasetSummary) {
    for &(label, count) in &summary.label_counts {
        let pct = count as f64 * 100.0 / summary.total_rows as f64;
        println!(
            "  {label:?}: {count} samples ({pct:.2}%) - {}",
            BeatType::from_label(label).description()
        );
    }
}

fn write_csv(path: &Path, rows: &[Sample]) -> Result<()> {
    let mut writer = csv::WriterBuilder::new()
        .has_headers(false)
        .from_path(path)
        .context("creating CSV")?;
    for sample in rows {
        let record: Vec<String> = sample
            .signal
            .iter()
            .chain(std::iter::once(&sample.label))
            .map(|v| v.to_string())
            .collect();
        writer.write_record(&record).context("writing CSV row")?;
    }
    writer.flush().context("flushing CSV")?;
    Ok(())
}

fn write_parquet(path: &Path, rows: &[Sample]) -> Result<()> {
    let mut signal_builder = ListBuilder::new(Float64Builder::new());
    for sample in rows {
        let values = signal_builder.values();
        for &v in &sample.signal {
            values.append_value(v);
        }
        signal_builder.append(true);
    }
    let signal_array = signal_builder.finish();
    let label_array = Float64Array::from(rows.iter().map(|s| s.label).collect::<Vec<_>>());

    let schema = Arc::new(Schema::new(vec![
        Field::new("signal", DataType::List(Arc::new(Field::new("item", DataType::Float64, true))), false),
        Field::new("label", DataType::Float64, false),
    ]));

    let batch = RecordBatch::try_new(
        schema.clone(),
        vec![Arc::new(signal_array), Arc::new(label_array)],
    )
    .context("building record batch")?;

    let file = std::fs::File::create(path).context("creating parquet file")?;
    let mut writer = ArrowWriter::try_new(file, schema, None).context("creating parquet writer")?;
    writer.write(&batch).context("writing parquet batch")?;
    writer.close().context("closing parquet writer")?;
    Ok(())
}

fn main() -> Result<()> {
    env_logger::init();
    let args = Args::parse();
    let total = usize::try_from(args.samples).context("--samples does not fit in memory")?;
    let mut rng = SimpleRng::new(args.seed);

    let (mut rows, signal_len) = match &args.input {
        Some(input) => {
            let train = load_file(input)?;
            if args.show_labels {
                println!("Available ECG labels in {}:", input.display());
                print_label_counts(train.summary());
                println!("\nTotal training samples: {}", train.len());
                return Ok(());
            }
            let available: Vec<f64> =
                train.summary().label_counts.iter().map(|&(l, _)| l).collect();
            let labels = target_labels(args.labels.as_deref(), &available)?;
            info!("Sampling {total} rows over labels {labels:?} from {}", input.display());
            (sample_from_dataset(&train, &labels, total, &mut rng), train.signal_len())
        }
        None => {
            let labels = target_labels(args.labels.as_deref(), &BEAT_LABELS)?;
            (synthesize(&labels, total, &mut rng), SIGNAL_LEN)
        }
    };
    shuffle(&mut rows, &mut rng);

    let dataset = EcgDataset::from_rows(rows)?;
    write_csv(&args.output, dataset.samples())?;
    let parquet_path = args.output.with_extension("parquet");
    write_parquet(&parquet_path, dataset.samples())?;

    let network = ConvNet::initialized(signal_len, args.seed)?;
    ModelArtifact::new(network).write(&args.model)?;

    println!(
        "Wrote {} heartbeats ({signal_len} samples each) to {} and {}, model to {}",
        dataset.len(),
        args.output.display(),
        parquet_path.display(),
        args.model.display()
    );
    println!("Distribution:");
    print_label_counts(dataset.summary());
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn dataset(labels: &[f64]) -> EcgDataset {
        let rows = labels
            .iter()
            .enumerate()
            .map(|(i, &l)| (vec![i as f64; 4], l))
            .collect();
        EcgDataset::from_rows(rows).unwrap()
    }

    #[test]
    fn counts_spread_remainder_over_first_labels() {
        assert_eq!(balanced_counts(100, 3), vec![34, 33, 33]);
        assert_eq!(balanced_counts(2, 5), vec![1, 1, 0, 0, 0]);
        assert!(balanced_counts(10, 0).is_empty());
    }

    #[test]
    fn keeps_only_available_labels() {
        let available = [0.0, 1.0, 2.0];
        assert_eq!(target_labels(None, &available).unwrap(), available.to_vec());
        assert_eq!(target_labels(Some(&[2.0, 4.0]), &available).unwrap(), vec![2.0]);
        assert!(target_labels(Some(&[7.0]), &available).is_err());
    }

    #[test]
    fn samples_balanced_rows_and_keeps_short_labels() {
        let train = dataset(&[0.0, 0.0, 0.0, 0.0, 0.0, 0.0, 2.0, 0.0, 0.0, 0.0]);
        let mut rng = SimpleRng::new(42);
        let rows = sample_from_dataset(&train, &[0.0, 2.0], 6, &mut rng);

        let normal = rows.iter().filter(|(_, l)| *l == 0.0).count();
        let abnormal = rows.iter().filter(|(_, l)| *l == 2.0).count();
        assert_eq!(normal, 3);
        // only one row carries label 2
        assert_eq!(abnormal, 1);
        // signals come from the training rows unchanged
        for (signal, label) in &rows {
            let source = train.get(signal[0] as i64).unwrap();
            assert_eq!(source.label, *label);
        }
    }

    #[test]
    fn sampling_is_reproducible_from_seed() {
        let train = dataset(&[0.0, 1.0, 0.0, 1.0, 0.0, 1.0, 0.0, 1.0]);
        let first = sample_from_dataset(&train, &[0.0, 1.0], 4, &mut SimpleRng::new(7));
        let second = sample_from_dataset(&train, &[0.0, 1.0], 4, &mut SimpleRng::new(7));
        assert_eq!(first, second);
    }

    #[test]
    fn synthesized_beats_are_unit_scaled() {
        let rows = synthesize(&[0.0, 2.0], 4, &mut SimpleRng::new(1));
        assert_eq!(rows.len(), 4);
        for (signal, _) in &rows {
            assert_eq!(signal.len(), SIGNAL_LEN);
            assert!(signal.iter().all(|v| (0.0..=1.0).contains(v)));
        }
    }

    #[test]
    fn parses_command_line() {
        let args = Args::try_parse_from([
            "generate_sample",
            "--labels",
            "0",
            "2",
            "4",
            "--samples",
            "50",
        ])
        .unwrap();
        assert_eq!(args.labels, Some(vec![0.0, 2.0, 4.0]));
        assert_eq!(args.samples, 50);
        assert_eq!(args.seed, 42);

        assert!(Args::try_parse_from(["generate_sample", "--labels"]).is_err());
        assert!(Args::try_parse_from(["generate_sample", "--samples", "0"]).is_err());
        assert!(Args::try_parse_from(["generate_sample", "--show-labels"]).is_err());
        assert!(
            Args::try_parse_from(["generate_sample", "--show-labels", "--input", "train.csv"])
                .unwrap()
                .show_labels
        );
    }
}
