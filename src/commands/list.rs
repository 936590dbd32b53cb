use std::io::{self, Write};

use anyhow::Result;

use noise_estimator::dataset::Dataset;
use noise_estimator::model::{MeasureKind, TimePeriod};

use crate::cli::{ListArgs, ListKind};
use crate::commands::{open_dataset, write_json_stdout};

pub fn run(args: ListArgs) -> Result<()> {
    let dataset = open_dataset(&args.dataset)?;

    if args.json {
        return match args.kind {
            ListKind::Categories => write_json_stdout(&dataset.categories()),
            ListKind::Scenarios => write_json_stdout(&dataset.scenarios()),
            ListKind::Plants => write_json_stdout(&dataset.plants()),
            ListKind::Measures => write_json_stdout(&dataset.measures()),
        };
    }

    let mut output = io::BufWriter::new(io::stdout().lock());
    write_rows(&mut output, &dataset, args.kind)?;
    output.flush()?;
    Ok(())
}

fn write_rows(output: &mut impl Write, dataset: &Dataset, kind: ListKind) -> Result<()> {
    match kind {
        ListKind::Categories => {
            for category in dataset.categories() {
                let nml = TimePeriod::BASE_PERIODS
                    .iter()
                    .map(|period| match category.nml_values.get(period) {
                        Some(level) => format!("{}={level}", period.as_str()),
                        None => format!("{}=-", period.as_str()),
                    })
                    .collect::<Vec<_>>()
                    .join(" ");
                writeln!(output, "{}\t{}\tNML {nml}", category.id, category.name)?;
            }
        }
        ListKind::Scenarios => {
            for scenario in dataset.scenarios() {
                writeln!(
                    output,
                    "{}\t{}\t{} components\t{}",
                    scenario.id,
                    scenario.name,
                    scenario.sound_power_levels.len(),
                    scenario.propagation_type.as_str()
                )?;
            }
        }
        ListKind::Plants => {
            for plant in dataset.plants() {
                writeln!(
                    output,
                    "{}\t{}\t{:.1} dB(A)\tduty {}\tusage {}",
                    plant.id, plant.name, plant.sound_power_level, plant.duty_cycle, plant.usage_factor
                )?;
            }
        }
        ListKind::Measures => {
            for measure in dataset.measures() {
                let kind = match measure.kind {
                    MeasureKind::Standard => "standard",
                    MeasureKind::Additional => "additional",
                };
                writeln!(output, "{}\t{kind}\t{}", measure.id, measure.title)?;
            }
        }
    }
    Ok(())
}
