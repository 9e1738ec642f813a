use anyhow::Result;
use thermal_probe::{arg, args_parser, opt};

pub struct Args {
    pub paths: Vec<String>,
    pub config: Option<String>,
    pub all_bands: bool,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-quality")
            .about("Score bands and report data quality of thermal rasters.")
            .arg(
                opt!("config")
                    .short("c")
                    .help("Engine configuration (json)"),
            )
            .arg(
                opt!("all bands")
                    .short("a")
                    .takes_value(false)
                    .help("Report quality of every band (default: selected band only)"),
            )
            .arg(
                arg!("paths")
                    .required(true)
                    .multiple(true)
                    .help("GeoTIFF paths"),
            )
            .get_matches();

        let paths = matches
            .values_of("paths")
            .unwrap()
            .map(|f| f.into())
            .collect();
        let config = matches.value_of("config").map(|c| c.into());
        let all_bands = matches.is_present("all bands");

        Ok(Args {
            paths,
            config,
            all_bands,
        })
    }
}
