use std::{
    fs::File,
    io::BufReader,
    path::{Path, PathBuf},
};

use argh::FromArgs;
use scenechange::eval::{
    align::{align_targets, load_metadata_batch},
    detection::{Detection, Target},
    map::{compute_map, MapConfig},
};

/// Computes the mean average precision of predictions against ground-truth targets
#[derive(Debug, FromArgs)]
struct Args {
    /// path to the predictions, a JSON list of {boxes, scores, labels}
    #[argh(positional)]
    predictions: PathBuf,

    /// path to the targets, a JSON list of {image, boxes, labels}
    #[argh(option, short = 't')]
    targets: PathBuf,

    /// path to the inference batch used to select and order the targets
    #[argh(option, short = 'm')]
    metadata: Option<PathBuf>,

    /// where to write the result
    #[argh(option, short = 'o', default = "PathBuf::from(\"map.json\")")]
    output: PathBuf,

    /// drop predictions scoring below this value
    #[argh(option, short = 's', default = "0.0")]
    score_threshold: f64,

    /// drop predictions with a smaller area in pixels
    #[argh(option, short = 'a', default = "0.0")]
    min_area: f64,
}

fn read_json<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T, Box<dyn std::error::Error>> {
    let reader = BufReader::new(File::open(path)?);
    Ok(serde_json::from_reader(reader)?)
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    env_logger::init();
    let args: Args = argh::from_env();

    let predictions: Vec<Detection> = read_json(&args.predictions)?;
    let all_targets: Vec<Target> = read_json(&args.targets)?;

    let targets = match &args.metadata {
        Some(path) => align_targets(&all_targets, &load_metadata_batch(path)?),
        None => all_targets,
    };

    let predictions = predictions
        .iter()
        .enumerate()
        .map(|(i, p)| {
            p.validate(i)?;
            p.filter_low_confidence(args.score_threshold)?
                .filter_by_area(args.min_area)
        })
        .collect::<Result<Vec<_>, _>>()?;

    log::info!(
        "evaluating {} predictions against {} targets",
        predictions.len(),
        targets.len()
    );

    let result = compute_map(&predictions, &targets, MapConfig::default())?;
    result.save_json(&args.output)?;

    println!("{result}");
    log::info!("result saved to {}", args.output.display());

    Ok(())
}
