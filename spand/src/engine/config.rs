/*
 * Created on Mon Apr 01 2024
 *
 * This file is a part of Spantable
 * Spantable is a free and open-source memory allocator simulator written by
 * Sayan Nandan ("the Author") with the vision to provide predictable,
 * ordered-index-backed extent bookkeeping for allocation research and
 * teaching workloads.
 *
 * Copyright (c) 2024, Sayan Nandan <ohsayan@outlook.com>
 *
 * This program is free software: you can redistribute it and/or modify
 * it under the terms of the GNU Affero General Public License as published by
 * the Free Software Foundation, either version 3 of the License, or
 * (at your option) any later version.
 *
 * This program is distributed in the hope that it will be useful,
 * but WITHOUT ANY WARRANTY; without even the implied warranty of
 * MERCHANTABILITY or FITNESS FOR A PARTICULAR PURPOSE. See the
 * GNU Affero General Public License for more details.
 *
 * You should have received a copy of the GNU Affero General Public License
 * along with this program. If not, see <https://www.gnu.org/licenses/>.
 *
*/

use {
    super::{core::Strategy, error::RuntimeResult},
    crate::util,
    core::fmt,
    serde::Deserialize,
    std::{collections::HashMap, env::VarError, fs},
};

/*
    misc
*/

pub type ParsedRawArgs = HashMap<String, Vec<String>>;

pub const DEFAULT_TOTAL_MEMORY: u64 = 1024;
/// Start addresses must survive the facade's signed sentinel encoding, so
/// the region capacity is capped well below `i64::MAX`
pub const MAX_TOTAL_MEMORY: u64 = 1 << 62;

const TXT_HELP: &str = "\
spand is the Spantable allocator simulator: it replays a trace of memory
request/release operations against a fixed-capacity region and reports what
each operation did.

USAGE:
    spand [OPTIONS]

FLAGS:
    -h, --help       Print this help menu
    -v, --version    Print version information

OPTIONS (CLI):
    --trace <file>            Trace to replay. CSV records `op,size,addr`
                              with op 1=request, 0=release
    --strategy <policy>       Placement policy: first-fit, best-fit or
                              worst-fit (default: first-fit)
    --memory <bytes>          Region capacity (default: 1024)
    --merge-allocated <bool>  Coalesce abutting allocations (default: true)
    --config <file>           Load every setting from a YAML file instead

OPTIONS (ENV):
    SPAN_TRACE, SPAN_STRATEGY, SPAN_MEMORY, SPAN_MERGE_ALLOCATED

Settings come from exactly one source: CLI flags, environment variables or
a configuration file. SPAN_LOG sets the log filter (error, warn, info,
debug, trace).";

#[derive(Debug, PartialEq)]
/// A value that knows whether anything was ever written to it
pub struct ModifyGuard<T> {
    val: T,
    modified: bool,
}

impl<T> ModifyGuard<T> {
    pub const fn new(val: T) -> Self {
        Self {
            val,
            modified: false,
        }
    }
    pub const fn is_modified(&self) -> bool {
        self.modified
    }
    pub fn into_inner(self) -> T {
        self.val
    }
}

impl<T> core::ops::Deref for ModifyGuard<T> {
    type Target = T;
    fn deref(&self) -> &Self::Target {
        &self.val
    }
}

impl<T> core::ops::DerefMut for ModifyGuard<T> {
    fn deref_mut(&mut self) -> &mut Self::Target {
        self.modified = true;
        &mut self.val
    }
}

/*
    configuration
*/

#[derive(Debug, PartialEq)]
/// The resolved settings a simulation runs with
pub struct Configuration {
    strategy: Strategy,
    total_memory: u64,
    merge_allocated: bool,
    trace: Option<String>,
}

impl Configuration {
    pub fn new(
        strategy: Strategy,
        total_memory: u64,
        merge_allocated: bool,
        trace: Option<String>,
    ) -> Self {
        Self {
            strategy,
            total_memory,
            merge_allocated,
            trace,
        }
    }
    pub fn strategy(&self) -> Strategy {
        self.strategy
    }
    pub fn total_memory(&self) -> u64 {
        self.total_memory
    }
    pub fn merge_allocated(&self) -> bool {
        self.merge_allocated
    }
    pub fn trace(&self) -> Option<&str> {
        self.trace.as_deref()
    }
}

impl Default for Configuration {
    fn default() -> Self {
        Self::new(Strategy::default(), DEFAULT_TOTAL_MEMORY, true, None)
    }
}

#[derive(Debug, PartialEq, Deserialize, Default)]
/// Raw decoded settings before validation; also the shape of the YAML
/// configuration file
pub struct DecodedConfiguration {
    strategy: Option<Strategy>,
    memory: Option<u64>,
    merge_allocated: Option<bool>,
    trace: Option<String>,
}

/*
    errors
*/

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
/// A configuration error (with an optional error origin source)
pub struct ConfigError {
    source: Option<ConfigSource>,
    kind: ConfigErrorKind,
}

impl ConfigError {
    fn _new(source: Option<ConfigSource>, kind: ConfigErrorKind) -> Self {
        Self { source, kind }
    }
    fn new(kind: ConfigErrorKind) -> Self {
        Self::_new(None, kind)
    }
    fn with_src(source: ConfigSource, kind: ConfigErrorKind) -> Self {
        Self::_new(Some(source), kind)
    }
}

impl fmt::Display for ConfigError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match &self.source {
            Some(src) => write!(f, "config error in {}: ", src.as_str())?,
            None => write!(f, "config error: ")?,
        }
        match &self.kind {
            ConfigErrorKind::Conflict => write!(
                f,
                "conflicting sources. pick either CLI flags, the environment or a configuration file"
            ),
            ConfigErrorKind::ErrorString(e) => write!(f, "{e}"),
        }
    }
}

#[derive(Debug, PartialEq)]
/// Where a setting came from
pub enum ConfigSource {
    Cli,
    Env,
    File,
}

impl ConfigSource {
    fn as_str(&self) -> &'static str {
        match self {
            ConfigSource::Cli => "CLI",
            ConfigSource::Env => "ENV",
            ConfigSource::File => "config file",
        }
    }
}

#[derive(Debug)]
#[cfg_attr(test, derive(PartialEq))]
pub enum ConfigErrorKind {
    /// more than one of CLI/ENV/file was provided
    Conflict,
    ErrorString(String),
}

/// A configuration source implementation
pub(super) trait ConfigurationSource {
    const KEY_STRATEGY: &'static str;
    const KEY_TOTAL_MEMORY: &'static str;
    const KEY_MERGE_ALLOCATED: &'static str;
    const KEY_TRACE: &'static str;
    const SOURCE: ConfigSource;
    /// Formats an error `invalid value for {key}`
    fn err_invalid_value_for(key: &str) -> ConfigError {
        ConfigError::with_src(
            Self::SOURCE,
            ConfigErrorKind::ErrorString(format!("invalid value for {key}")),
        )
    }
    /// Formats an error `too many values for {key}`
    fn err_too_many_values_for(key: &str) -> ConfigError {
        ConfigError::with_src(
            Self::SOURCE,
            ConfigErrorKind::ErrorString(format!("too many values for {key}")),
        )
    }
    fn custom_err(error: String) -> ConfigError {
        ConfigError::with_src(Self::SOURCE, ConfigErrorKind::ErrorString(error))
    }
}

pub struct CSCommandLine;
impl CSCommandLine {
    const ARG_CONFIG_FILE: &'static str = "--config";
}
impl ConfigurationSource for CSCommandLine {
    const KEY_STRATEGY: &'static str = "--strategy";
    const KEY_TOTAL_MEMORY: &'static str = "--memory";
    const KEY_MERGE_ALLOCATED: &'static str = "--merge-allocated";
    const KEY_TRACE: &'static str = "--trace";
    const SOURCE: ConfigSource = ConfigSource::Cli;
}

pub struct CSEnvArgs;
impl ConfigurationSource for CSEnvArgs {
    const KEY_STRATEGY: &'static str = "SPAN_STRATEGY";
    const KEY_TOTAL_MEMORY: &'static str = "SPAN_MEMORY";
    const KEY_MERGE_ALLOCATED: &'static str = "SPAN_MERGE_ALLOCATED";
    const KEY_TRACE: &'static str = "SPAN_TRACE";
    const SOURCE: ConfigSource = ConfigSource::Env;
}

pub struct CSConfigFile;
impl ConfigurationSource for CSConfigFile {
    const KEY_STRATEGY: &'static str = "strategy";
    const KEY_TOTAL_MEMORY: &'static str = "memory";
    const KEY_MERGE_ALLOCATED: &'static str = "merge_allocated";
    const KEY_TRACE: &'static str = "trace";
    const SOURCE: ConfigSource = ConfigSource::File;
}

fn argck_duplicate_values<CS: ConfigurationSource>(
    v: &[String],
    key: &'static str,
) -> RuntimeResult<()> {
    if v.len() != 1 {
        return util::err(CS::err_too_many_values_for(key));
    }
    Ok(())
}

/*
    decode helpers
*/

fn arg_decode_strategy<CS: ConfigurationSource>(
    v: &[String],
    config: &mut ModifyGuard<DecodedConfiguration>,
) -> RuntimeResult<()> {
    argck_duplicate_values::<CS>(v, CS::KEY_STRATEGY)?;
    match v[0].parse::<Strategy>() {
        Ok(strategy) => {
            config.strategy = Some(strategy);
            Ok(())
        }
        Err(()) => util::err(CS::err_invalid_value_for(CS::KEY_STRATEGY)),
    }
}

fn arg_decode_memory<CS: ConfigurationSource>(
    v: &[String],
    config: &mut ModifyGuard<DecodedConfiguration>,
) -> RuntimeResult<()> {
    argck_duplicate_values::<CS>(v, CS::KEY_TOTAL_MEMORY)?;
    match v[0].parse::<u64>() {
        Ok(memory) => {
            config.memory = Some(memory);
            Ok(())
        }
        Err(_) => util::err(CS::err_invalid_value_for(CS::KEY_TOTAL_MEMORY)),
    }
}

fn arg_decode_merge_allocated<CS: ConfigurationSource>(
    v: &[String],
    config: &mut ModifyGuard<DecodedConfiguration>,
) -> RuntimeResult<()> {
    argck_duplicate_values::<CS>(v, CS::KEY_MERGE_ALLOCATED)?;
    match v[0].parse::<bool>() {
        Ok(merge) => {
            config.merge_allocated = Some(merge);
            Ok(())
        }
        Err(_) => util::err(CS::err_invalid_value_for(CS::KEY_MERGE_ALLOCATED)),
    }
}

fn arg_decode_trace<CS: ConfigurationSource>(
    v: &[String],
    config: &mut ModifyGuard<DecodedConfiguration>,
) -> RuntimeResult<()> {
    argck_duplicate_values::<CS>(v, CS::KEY_TRACE)?;
    config.trace = Some(v[0].clone());
    Ok(())
}

/*
    CLI args process
*/

#[derive(Debug, PartialEq)]
pub enum CLIConfigParseReturn<T> {
    /// No architecture changes to the default configuration
    Default,
    /// Help request
    Help,
    /// Version request
    Version,
    YieldedConfig(T),
}

/// Parse CLI args:
/// - `--{option} {value}`
/// - `--{option}={value}`
pub fn parse_cli_args<'a, T: 'a + AsRef<str>>(
    src: impl Iterator<Item = T>,
) -> RuntimeResult<CLIConfigParseReturn<ParsedRawArgs>> {
    let mut args_iter = src.into_iter().skip(1);
    let mut cli_args: ParsedRawArgs = HashMap::new();
    while let Some(arg) = args_iter.next() {
        let arg = arg.as_ref();
        if arg == "--help" || arg == "-h" {
            return Ok(CLIConfigParseReturn::Help);
        }
        if arg == "--version" || arg == "-v" {
            return Ok(CLIConfigParseReturn::Version);
        }
        if !arg.starts_with("--") {
            return util::err(ConfigError::with_src(
                ConfigSource::Cli,
                ConfigErrorKind::ErrorString(format!("unexpected argument `{arg}`")),
            ));
        }
        // `--x=1` or `--x 1`
        let arg_key;
        let arg_val;
        let splits_arg_and_value = arg.split('=').collect::<Vec<&str>>();
        if (splits_arg_and_value.len() == 2) & (arg.len() >= 5) {
            arg_key = splits_arg_and_value[0];
            arg_val = splits_arg_and_value[1].to_string();
        } else if splits_arg_and_value.len() != 1 {
            // none of our options have special characters in their values
            return util::err(ConfigError::with_src(
                ConfigSource::Cli,
                ConfigErrorKind::ErrorString(format!("incorrectly formatted argument `{arg}`")),
            ));
        } else {
            let Some(value) = args_iter.next() else {
                return util::err(ConfigError::with_src(
                    ConfigSource::Cli,
                    ConfigErrorKind::ErrorString(format!("missing value for option `{arg}`")),
                ));
            };
            arg_key = arg;
            arg_val = value.as_ref().to_string();
        }
        // merge duplicates into a vec
        match cli_args.get_mut(arg_key) {
            Some(cli) => cli.push(arg_val),
            None => {
                cli_args.insert(arg_key.to_string(), vec![arg_val]);
            }
        }
    }
    if cli_args.is_empty() {
        Ok(CLIConfigParseReturn::Default)
    } else {
        Ok(CLIConfigParseReturn::YieldedConfig(cli_args))
    }
}

/*
    env args process
*/

/// Parse environment variables
pub fn parse_env_args() -> RuntimeResult<Option<ParsedRawArgs>> {
    const KEYS: [&str; 4] = [
        CSEnvArgs::KEY_STRATEGY,
        CSEnvArgs::KEY_TOTAL_MEMORY,
        CSEnvArgs::KEY_MERGE_ALLOCATED,
        CSEnvArgs::KEY_TRACE,
    ];
    let mut ret = HashMap::new();
    for key in KEYS {
        let var = match std::env::var(key) {
            Ok(v) => v,
            Err(VarError::NotPresent) => continue,
            Err(VarError::NotUnicode(_)) => {
                return util::err(CSEnvArgs::custom_err(format!("invalid value for `{key}`")))
            }
        };
        ret.insert(key.to_owned(), vec![var]);
    }
    if ret.is_empty() {
        Ok(None)
    } else {
        Ok(Some(ret))
    }
}

/*
    apply config changes
*/

/// Decode the raw args into a [`DecodedConfiguration`], erroring out on
/// anything unrecognized
fn apply_config_changes<CS: ConfigurationSource>(
    args: &mut ParsedRawArgs,
) -> RuntimeResult<ModifyGuard<DecodedConfiguration>> {
    let mut config = ModifyGuard::new(DecodedConfiguration::default());
    let decode_tasks: [(
        &'static str,
        fn(&[String], &mut ModifyGuard<DecodedConfiguration>) -> RuntimeResult<()>,
    ); 4] = [
        (CS::KEY_STRATEGY, arg_decode_strategy::<CS>),
        (CS::KEY_TOTAL_MEMORY, arg_decode_memory::<CS>),
        (CS::KEY_MERGE_ALLOCATED, arg_decode_merge_allocated::<CS>),
        (CS::KEY_TRACE, arg_decode_trace::<CS>),
    ];
    for (key, decode) in decode_tasks {
        if let Some(values_for_arg) = args.get(key) {
            (decode)(values_for_arg, &mut config)?;
            args.remove(key);
        }
    }
    if !args.is_empty() {
        util::err(CS::custom_err("found unknown arguments".into()))
    } else {
        Ok(config)
    }
}

/*
    validate
*/

#[derive(Debug, PartialEq)]
pub enum ConfigReturn {
    /// A configuration that we have fully validated
    Config(Configuration),
    /// A help message
    HelpMessage(String),
}

impl ConfigReturn {
    #[cfg(test)]
    pub fn into_config(self) -> Configuration {
        match self {
            Self::Config(c) => c,
            _ => panic!("expected a configuration"),
        }
    }
}

fn validate_configuration<CS: ConfigurationSource>(
    decoded: DecodedConfiguration,
) -> RuntimeResult<ConfigReturn> {
    let DecodedConfiguration {
        strategy,
        memory,
        merge_allocated,
        trace,
    } = decoded;
    let total_memory = memory.unwrap_or(DEFAULT_TOTAL_MEMORY);
    if total_memory == 0 || total_memory > MAX_TOTAL_MEMORY {
        return util::err(CS::err_invalid_value_for(CS::KEY_TOTAL_MEMORY));
    }
    if !total_memory.is_power_of_two() {
        // legal, but the stratified indexes size their universe by
        // ⌈log₂ total⌉, so the top bucket will run light
        log::warn!("region capacity {total_memory} is not a power of two");
    }
    Ok(ConfigReturn::Config(Configuration::new(
        strategy.unwrap_or_default(),
        total_memory,
        merge_allocated.unwrap_or(true),
        trace,
    )))
}

fn apply_and_validate<CS: ConfigurationSource>(
    args: &mut ParsedRawArgs,
) -> RuntimeResult<ConfigReturn> {
    let cfg = apply_config_changes::<CS>(args)?;
    if cfg.is_modified() {
        validate_configuration::<CS>(cfg.into_inner())
    } else {
        Ok(ConfigReturn::Config(Configuration::default()))
    }
}

/*
    root
*/

/// Resolve the configuration from every supported source. Rules:
/// - `--help`/`--version` short-circuit into a [`ConfigReturn::HelpMessage`]
/// - settings come from exactly one of CLI/ENV/file; mixing is a conflict
/// - `--config <file>` must be the only CLI flag when present
pub fn check_configuration() -> RuntimeResult<ConfigReturn> {
    resolve_configuration(parse_cli_args(std::env::args())?, parse_env_args()?)
}

fn resolve_configuration(
    cli: CLIConfigParseReturn<ParsedRawArgs>,
    env: Option<ParsedRawArgs>,
) -> RuntimeResult<ConfigReturn> {
    match cli {
        CLIConfigParseReturn::Help => Ok(ConfigReturn::HelpMessage(TXT_HELP.to_owned())),
        CLIConfigParseReturn::Version => Ok(ConfigReturn::HelpMessage(format!(
            "spand v{}",
            libspan::VERSION
        ))),
        CLIConfigParseReturn::Default => match env {
            Some(mut env_args) => apply_and_validate::<CSEnvArgs>(&mut env_args),
            None => Ok(ConfigReturn::Config(Configuration::default())),
        },
        CLIConfigParseReturn::YieldedConfig(mut cli_args) => {
            if env.is_some() {
                return util::err(ConfigError::new(ConfigErrorKind::Conflict));
            }
            match cli_args.remove(CSCommandLine::ARG_CONFIG_FILE) {
                Some(cfg_file) => {
                    if !cli_args.is_empty() {
                        return util::err(ConfigError::new(ConfigErrorKind::Conflict));
                    }
                    argck_duplicate_values::<CSCommandLine>(
                        &cfg_file,
                        CSCommandLine::ARG_CONFIG_FILE,
                    )?;
                    let raw = fs::read_to_string(&cfg_file[0])?;
                    decode_config_file(&raw)
                }
                None => apply_and_validate::<CSCommandLine>(&mut cli_args),
            }
        }
    }
}

fn decode_config_file(raw: &str) -> RuntimeResult<ConfigReturn> {
    let decoded: DecodedConfiguration = serde_yaml::from_str(raw).map_err(|e| {
        CSConfigFile::custom_err(format!("syntax error in configuration file: {e}"))
    })?;
    validate_configuration::<CSConfigFile>(decoded)
}
