use class2cil::*;

use clap::{crate_version, Arg, ArgAction, Command};
use std::fs;
use std::io::BufWriter;
use std::path::PathBuf;

fn main() -> Result<(), jvm::Error> {
    env_logger::init();

    let matches = Command::new("Class file to IL converter")
        .version(crate_version!())
        .about("Translate JVM class files into a managed IL module")
        .arg(
            Arg::new("module")
                .long("module-name")
                .value_name("NAME")
                .default_value("main")
                .help("Name recorded in the output module header"),
        )
        .arg(
            Arg::new("output")
                .short('o')
                .long("output")
                .value_name("FILE")
                .value_parser(clap::value_parser!(PathBuf))
                .help("Output image file (defaults to `<module-name>.cilm`)"),
        )
        .arg(
            Arg::new("INPUT")
                .help("Input class files, translated together as one batch")
                .required(true)
                .action(ArgAction::Append)
                .value_parser(clap::value_parser!(PathBuf)),
        )
        .get_matches();

    let module_name = matches.get_one::<String>("module").unwrap();
    let settings = translate::Settings::new(module_name.clone());

    let arenas = cil::graph::TypeGraphArenas::new();
    let graph = cil::graph::TypeGraph::new(&arenas);
    let mut translator = translate::ModuleTranslator::new(settings, &graph);

    for input in matches.get_many::<PathBuf>("INPUT").unwrap() {
        log::info!("Reading '{}'", input.display());
        let class_bytes = fs::read(input)?;
        translator.include(&class_bytes)?;
    }

    let (module, diagnostics) = translator.translate();
    for diagnostic in diagnostics.iter() {
        log::error!("{}", diagnostic);
    }

    let output = matches
        .get_one::<PathBuf>("output")
        .cloned()
        .unwrap_or_else(|| PathBuf::from(format!("{}.cilm", module_name)));
    log::info!("Writing '{}'", output.display());
    let mut writer = BufWriter::new(fs::File::create(&output)?);
    module.serialize(&mut writer)?;

    Ok(())
}
