
#[macro_use]
extern crate tracing;

use std::io::{Read, Write};
use std::path::PathBuf;

use anyhow::Context;
use runtime::args::{self, ArgError};
use videoframes::scraper::Html;
use videoframes::{Policy, Rules, RulesConfig, VideoFrames};

const USAGE: &str = "\
[FLAGS] [PATH|-]

Rewrites embedded videos in an HTML document (from PATH or stdin) and prints it.

  -fragment        treat input as a fragment and print only its contents
  -site=URL        URL the document came from
  -allow=a,b       elements the surrounding sanitizer allows
  -deny=a,b        attributes the surrounding sanitizer strips
                   (with both -allow and -deny, unknown iframes are removed
                   unless iframe is already allowed)
  -rules=PATH      YAML rule tables merged over the built-in ones
  -only-rules      use the -rules file without the built-in tables
  -v               trace every rewritten element
";

#[derive(Debug, Default)]
struct Options {
    input: Option<String>,
    fragment: bool,
    site_url: String,
    allow: Option<Vec<String>>,
    deny: Option<Vec<String>>,
    rules: Option<PathBuf>,
    only_rules: bool,
    verbose: bool,
}

impl Options {
    fn policy(&self) -> Option<Policy> {
        match (&self.allow, &self.deny) {
            (Some(allow), Some(deny)) => Some(Policy::new(allow.clone(), deny.clone())),
            _ => None,
        }
    }
}

fn parse_options(argv: impl Iterator<Item = String>) -> Result<Option<Options>, ArgError> {
    let mut opts = Options::default();
    let mut positional = Vec::new();

    let res = args::parse_args(argv, |flag, inline, rest, arg0| {
        match flag {
            "h" | "help" => {
                eprintln!("usage: {arg0} {USAGE}");
                return Ok(None);
            },
            "fragment" => opts.fragment = args::parse_flag_optional_bool(inline)?,
            "site" => opts.site_url = args::parse_param(flag, rest, inline)?,
            "allow" => opts.allow = Some(args::parse_list(&args::parse_param(flag, rest, inline)?)),
            "deny" => opts.deny = Some(args::parse_list(&args::parse_param(flag, rest, inline)?)),
            "rules" => opts.rules = Some(args::parse_param(flag, rest, inline)?.into()),
            "only-rules" => opts.only_rules = args::parse_flag_optional_bool(inline)?,
            "v" | "verbose" => opts.verbose = args::parse_flag_optional_bool(inline)?,
            _ => return Err(ArgError::UnknownFlag(flag.into())),
        }
        Ok(Some(()))
    }, |_, arg| {
        positional.push(arg);
        Ok(Some(()))
    })?;
    if res.is_none() {
        return Ok(None);
    }

    let mut positional = positional.into_iter();
    opts.input = positional.next();
    if let Some(extra) = positional.next() {
        return Err(ArgError::UnexpectedArg(extra));
    }
    if opts.only_rules && opts.rules.is_none() {
        return Err(ArgError::MissingArg("rules".into()));
    }
    Ok(Some(opts))
}

fn load_rules(opts: &Options) -> Result<Option<Rules>, anyhow::Error> {
    let Some(path) = &opts.rules else { return Ok(None) };

    let text = fs_err::read_to_string(path)?;
    let config = serde_yaml::from_str::<RulesConfig>(&text)
        .with_context(|| format!("parsing rules file {}", path.display()))?;
    let rules = if opts.only_rules {
        Rules::from_config(&config)
    } else {
        Rules::builtin_with(&config)
    }.with_context(|| format!("invalid rule in {}", path.display()))?;

    info!(iframes = rules.iframes.len(), objects = rules.objects.len(), "loaded rules from {}", path.display());
    Ok(Some(rules))
}

fn read_input(input: Option<&str>) -> Result<String, anyhow::Error> {
    match input {
        None | Some("-") => {
            let mut text = String::new();
            std::io::stdin().read_to_string(&mut text).context("reading stdin")?;
            Ok(text)
        },
        Some(path) => Ok(fs_err::read_to_string(path)?),
    }
}

/// Parses `html`, runs the filter, and serializes the result.
fn process(html: &str, opts: &Options, engine: VideoFrames<'_>) -> (String, Option<Policy>) {
    let mut document = if opts.fragment {
        Html::parse_fragment(html)
    } else {
        Html::parse_document(html)
    };

    let result = engine.sanitize(&mut document, &opts.site_url, opts.policy());

    let output = if opts.fragment {
        document.root_element().inner_html()
    } else {
        document.html()
    };
    (output, result.updated_policy)
}

fn run(opts: &Options) -> Result<(), anyhow::Error> {
    let rules = load_rules(opts)?;
    let engine = match &rules {
        Some(rules) => VideoFrames::with_rules(rules),
        None => VideoFrames::new(),
    };

    let html = read_input(opts.input.as_deref())?;
    let (output, updated_policy) = process(&html, opts, engine);

    let mut stdout = std::io::stdout().lock();
    writeln!(stdout, "{output}").context("writing output")?;

    if let Some(policy) = updated_policy {
        eprintln!("allowed-elements: {}", policy.allowed_elements.join(","));
        eprintln!("disallowed-attributes: {}", policy.disallowed_attributes.join(","));
    }
    Ok(())
}

fn main() {
    let opts = match parse_options(std::env::args()) {
        Ok(Some(opts)) => opts,
        Ok(None) => return,
        Err(e) => {
            eprintln!("{e}\n\nusage: videoframes {USAGE}");
            std::process::exit(2);
        },
    };

    if let Err(e) = runtime::log::setup_logger("videoframes", opts.verbose) {
        eprintln!("Logging disabled: {e}");
    }

    if let Err(e) = run(&opts) {
        eprintln!("videoframes error: {e:#}");
        std::process::exit(1);
    }
}
