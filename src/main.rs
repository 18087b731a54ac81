use std::process::ExitCode;

use clap::Parser;
use copyhaul::{
   cli::{Args, parse_labels},
   config::Config,
   console,
   error::MigrationError,
   workflow::{RunFlags, WorkflowRunner},
   workflow_config::WorkflowConfig,
};

fn run(args: &Args) -> copyhaul::error::Result<()> {
   let mut engine_config = if let Some(path) = &args.config {
      Config::from_file(path)?
   } else {
      Config::load()?
   };
   if let Some(root) = &args.output_root {
      engine_config.output_root = Some(root.clone());
   }

   let workflow = WorkflowConfig::load(&args.workflow_config)?;

   if args.info {
      console::boxed("workflow", &[
         format!("name: {}", workflow.name),
         format!("mode: {:?}", workflow.mode),
         format!("origin: {} ({})", workflow.origin.kind, workflow.origin.url),
         format!("destination: {} ({})", workflow.destination.kind, workflow.destination.url),
         format!("rev_id_label: {}", workflow.rev_id_label()),
      ]);
      return Ok(());
   }

   if args.validate {
      workflow.build_origin()?;
      workflow.build_destination()?;
      workflow.origin_glob()?;
      workflow.destination_glob()?;
      workflow.build_pipeline(engine_config.worker_threads, &[], None)?;
      console::success("workflow configuration is valid");
      return Ok(());
   }

   let config_path = args.workflow_config.to_string_lossy().into_owned();
   let runner = WorkflowRunner::new(&workflow, config_path, &engine_config);

   let flags = RunFlags {
      last_rev_override: args.last_rev.clone(),
      force: args.force,
      init_history: args.init_history,
      dry_run: args.dry_run,
      iterative_limit_changes: args.iterative_limit_changes,
      ignore_noop: args.ignore_noop,
      disable_reversible_check: args.disable_reversible_check,
      labels: parse_labels(&args.labels),
      skip_transforms: args.skip_transforms.clone(),
      nocleanup: args.nocleanup,
      ..RunFlags::default()
   };

   let recorder = runner.run(args.source_ref.as_deref(), &flags)?;
   for effect in recorder.effects() {
      console::status(&format!("{:?}: {}", effect.effect_type, effect.summary));
   }

   if recorder.has_errors() {
      return Err(MigrationError::Other("migration completed with recorded errors".to_string()));
   }
   console::success("migration complete");
   Ok(())
}

fn main() -> ExitCode {
   dotenvy::dotenv().ok();
   let args = Args::parse();
   console::init(args.no_color);

   match run(&args) {
      Ok(()) => ExitCode::SUCCESS,
      Err(e) => {
         console::error(&e.to_string());
         ExitCode::from(e.exit_code() as u8)
      },
   }
}
