use anyhow::Result;
use clap::value_t_or_exit;
use thermal_probe::{arg, args_parser, cli::parse_pixel, opt, SamplingMode};

pub struct Args {
    pub path: String,
    pub pixels: Vec<(usize, usize)>,
    pub config: Option<String>,
    pub band: Option<usize>,
    pub mode: Option<SamplingMode>,
    pub max_radius: Option<usize>,
}

impl Args {
    pub fn from_cmd_line() -> Result<Args> {
        let matches = args_parser!("thermal-sample")
            .about("Sample temperatures at pixels of a thermal raster.")
            .arg(
                opt!("at")
                    .short("p")
                    .required(true)
                    .multiple(true)
                    .number_of_values(1)
                    .help("Pixel position as `row,col` (repeatable)"),
            )
            .arg(
                opt!("band")
                    .short("b")
                    .help("Band to sample, 0-based (default: best scoring band)"),
            )
            .arg(
                opt!("mode")
                    .short("m")
                    .possible_values(&["neighborhood", "cell", "pixel"])
                    .help("Sampling mode (default: neighborhood)"),
            )
            .arg(
                opt!("max radius")
                    .short("r")
                    .help("Largest interpolation radius in pixels.  Default is 15"),
            )
            .arg(
                opt!("config")
                    .short("c")
                    .help("Engine configuration (json)"),
            )
            .arg(arg!("path").required(true).help("GeoTIFF path"))
            .get_matches();

        let path = matches.value_of("path").unwrap().into();
        let pixels = matches
            .values_of("at")
            .unwrap()
            .map(parse_pixel)
            .collect::<Result<_>>()?;
        let band = matches
            .is_present("band")
            .then(|| value_t_or_exit!(matches.value_of("band"), usize));
        let mode = matches
            .is_present("mode")
            .then(|| value_t_or_exit!(matches.value_of("mode"), SamplingMode));
        let max_radius = matches
            .is_present("max radius")
            .then(|| value_t_or_exit!(matches.value_of("max radius"), usize));
        let config = matches.value_of("config").map(|c| c.into());

        Ok(Args {
            path,
            pixels,
            config,
            band,
            mode,
            max_radius,
        })
    }
}
