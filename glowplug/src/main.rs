use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{anyhow, bail, Context, Result};
use clap::{Parser, Subcommand, ValueEnum};
use log::{debug, info};
use serde::{Deserialize, Serialize};

use glowplug_lib::{
    ChainView, Descriptor, DriverRegistry, Hardware, Param, ParamValue, PixelFormat, PropertyType,
    PropertyValue,
};

fn main() -> Result<()> {
    env_logger::init();

    let cli = Cli::parse();

    handle_cli(cli)
}

/// This struct defines the command line interface of the application
#[derive(Parser)]
#[clap(
    name = "glowplug",
    about = "Exercises LED output drivers",
    version = "0.1.0"
)]
pub struct Cli {
    #[clap(subcommand)]
    pub command: Commands,
}

/// Supported output formats for the `list` and `props` commands.
#[derive(Copy, Clone, PartialEq, Eq, PartialOrd, Ord, ValueEnum)]
pub enum OutputFormat {
    /// Plain text format.
    Plaintext,
    /// JSON format.
    Json,
    /// YAML format.
    Yaml,
}

/// Subcommands available for the CLI
#[derive(Subcommand)]
pub enum Commands {
    /// Lists the built-in driver families
    #[clap(name = "list")]
    List {
        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Shows the custom properties of a driver family and their defaults
    #[clap(name = "props")]
    Props {
        /// Driver family, e.g. "dummy"
        family: String,

        /// Output format (plaintext, json, yaml)
        #[clap(short, long, value_enum, default_value_t = OutputFormat::Plaintext)]
        output: OutputFormat,
    },
    /// Sets up one hardware, fills its chain with a constant level and shows it
    #[clap(name = "test")]
    Test {
        /// Hardware description in YAML or JSON; overrides the flags below
        #[clap(short, long)]
        config: Option<PathBuf>,

        /// Driver family
        #[clap(short, long)]
        family: Option<String>,

        /// Device identifier, "*" picks the first usable device
        #[clap(short, long, default_value = "*")]
        id: String,

        /// Number of LEDs in the chain
        #[clap(short = 'n', long, default_value_t = 64)]
        led_count: usize,

        /// Pixel format of the chain
        #[clap(long, default_value = "RGB u8")]
        format: String,

        /// Custom property as name=value, may be repeated
        #[clap(short, long = "set", value_parser = parse_assignment)]
        set: Vec<(String, String)>,

        /// Level every LED component is filled with
        #[clap(short, long, default_value_t = 0x80)]
        level: u8,

        /// Gain applied to every LED before sending
        #[clap(short, long)]
        gain: Option<u16>,
    },
}

fn parse_assignment(s: &str) -> Result<(String, String), &'static str> {
    let (name, value) = s
        .split_once('=')
        .ok_or("expected a property assignment of the form name=value")?;
    if name.is_empty() {
        return Err("property name must not be empty");
    }
    Ok((name.to_string(), value.to_string()))
}

/// One hardware to set up, as read from a config file.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct HardwareConfig {
    #[serde(default = "default_name")]
    pub name: String,
    pub family: String,
    #[serde(default = "default_id")]
    pub id: String,
    pub led_count: usize,
    pub format: PixelFormat,
    #[serde(default)]
    pub properties: BTreeMap<String, PropertyValue>,
}

fn default_name() -> String {
    "hw0".to_string()
}

fn default_id() -> String {
    "*".to_string()
}

impl HardwareConfig {
    fn from_file(path: &Path) -> Result<Self> {
        let text = fs::read_to_string(path)
            .with_context(|| format!("Failed to read \"{}\"", path.display()))?;
        let config = match path.extension().and_then(|e| e.to_str()) {
            Some("json") => serde_json::from_str(&text)?,
            _ => serde_yaml::from_str(&text)?,
        };
        Ok(config)
    }
}

/// A registered property with the value the backend starts out with.
#[derive(Debug, Serialize)]
struct PropertyInfo {
    name: String,
    kind: PropertyType,
    default: PropertyValue,
}

/// Converts command line text into a value of the declared property type.
fn parse_property(kind: PropertyType, raw: &str) -> Result<PropertyValue> {
    let value = match kind {
        PropertyType::Int => PropertyValue::Int(
            raw.parse()
                .with_context(|| format!("\"{}\" is not an integer", raw))?,
        ),
        PropertyType::Float => PropertyValue::Float(
            raw.parse()
                .with_context(|| format!("\"{}\" is not a number", raw))?,
        ),
        PropertyType::String => PropertyValue::String(raw.to_string()),
    };
    Ok(value)
}

/// Widens integers given for float properties, as YAML and JSON cannot tell them apart.
fn coerce_property(kind: PropertyType, value: PropertyValue) -> PropertyValue {
    match (kind, value) {
        (PropertyType::Float, PropertyValue::Int(i)) => PropertyValue::Float(i as f64),
        (_, value) => value,
    }
}

fn lookup<'a>(registry: &'a DriverRegistry, family: &str) -> Result<&'a Descriptor> {
    registry.get(family).ok_or_else(|| {
        let known: Vec<_> = registry.families().collect();
        anyhow!(
            "Unknown driver family \"{}\", known families: {}",
            family,
            known.join(", ")
        )
    })
}

fn print_descriptors(descriptors: &[&Descriptor]) {
    for descriptor in descriptors {
        println!("{} {}", descriptor.family, descriptor.version);
        println!("  {}", descriptor.description);
        println!("  API version: {}", descriptor.api_version);
        println!("  License: {}", descriptor.license);
        println!("  Author: {}", descriptor.author);
        if !descriptor.url.is_empty() {
            println!("  URL: {}", descriptor.url);
        }
        println!("  Identifier: {}", descriptor.id_example);
    }
}

fn properties_of(descriptor: &Descriptor) -> Result<Vec<PropertyInfo>> {
    let hw = Hardware::load(descriptor.family, descriptor)?;
    let properties = hw
        .properties()
        .iter()
        .map(|(name, kind)| -> Result<PropertyInfo> {
            let default = match hw.get(&Param::custom(name))? {
                ParamValue::Custom(value) => value,
                other => bail!("Property \"{}\" returned {:?}", name, other),
            };
            Ok(PropertyInfo {
                name: name.to_string(),
                kind,
                default,
            })
        })
        .collect();
    properties
}

fn run_test(
    config: HardwareConfig,
    overrides: &[(String, String)],
    level: u8,
    gain: Option<u16>,
) -> Result<()> {
    let registry = DriverRegistry::builtin();
    let descriptor = lookup(&registry, &config.family)?;
    let mut hw = Hardware::load(&config.name, descriptor)
        .with_context(|| format!("Failed to load \"{}\"", config.family))?;

    for (name, value) in config.properties {
        let kind = hw
            .properties()
            .property_type(&name)
            .ok_or_else(|| anyhow!("\"{}\" has no property \"{}\"", config.family, name))?;
        hw.set(&Param::custom(&name), ParamValue::Custom(coerce_property(kind, value)))?;
    }
    for (name, raw) in overrides {
        let kind = hw
            .properties()
            .property_type(name)
            .ok_or_else(|| anyhow!("\"{}\" has no property \"{}\"", config.family, name))?;
        hw.set(&Param::custom(name), ParamValue::Custom(parse_property(kind, raw)?))?;
    }

    hw.hw_init(&config.id, &config.format)
        .with_context(|| format!("Failed to initialize \"{}\"", config.id))?;
    hw.set(&Param::LedCount, ParamValue::LedCount(config.led_count))?;
    if let Some(gain) = gain {
        for pos in 0..config.led_count {
            hw.set(&Param::Gain(pos), ParamValue::Gain(gain))?;
        }
    }
    if let ParamValue::Id(id) = hw.get(&Param::Id)? {
        info!("\"{}\" is bound to \"{}\"", config.name, id);
    }

    let buffer = vec![level; config.led_count * config.format.bytes_per_component()];
    let chain = ChainView::new(&buffer, config.led_count, &config.format)?;
    debug!("Sending {} bytes", chain.buffer_size());
    hw.send(&chain, config.led_count, 0)?;
    hw.show()?;

    println!(
        "Showed {} LEDs at level {} on {} \"{}\"",
        config.led_count, level, config.family, config.id
    );
    Ok(())
}

fn handle_cli(cli: Cli) -> Result<()> {
    match cli.command {
        Commands::List { output } => {
            let registry = DriverRegistry::builtin();
            let descriptors: Vec<_> = registry.iter().collect();
            match output {
                OutputFormat::Plaintext => {
                    print_descriptors(&descriptors);
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&descriptors)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&descriptors)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::Props { family, output } => {
            let registry = DriverRegistry::builtin();
            let properties = properties_of(lookup(&registry, &family)?)?;
            match output {
                OutputFormat::Plaintext => {
                    if properties.is_empty() {
                        println!("{} has no custom properties", family);
                    }
                    for property in &properties {
                        println!(
                            "{} ({}): {}",
                            property.name,
                            property.kind,
                            serde_json::to_string(&property.default)?
                        );
                    }
                }
                OutputFormat::Json => {
                    let json = serde_json::to_string(&properties)?;
                    println!("{}", json);
                }
                OutputFormat::Yaml => {
                    let yaml = serde_yaml::to_string(&properties)?;
                    println!("{}", yaml);
                }
            }
        }
        Commands::Test {
            config,
            family,
            id,
            led_count,
            format,
            set,
            level,
            gain,
        } => {
            let config = match (config, family) {
                (Some(path), _) => HardwareConfig::from_file(&path)?,
                (None, Some(family)) => HardwareConfig {
                    name: default_name(),
                    family,
                    id,
                    led_count,
                    format: format.parse()?,
                    properties: BTreeMap::new(),
                },
                (None, None) => bail!("Either --config or --family is required"),
            };
            run_test(config, &set, level, gain)?;
        }
    }

    Ok(())
}
