use crate::config::AppConfig;
use fraggrow::engine::external::{
    CommandClusterer, CommandInterpolator, CommandRunner, ReportRankSelector, StructurePreparer,
    StructureSelector, TemplateConfigurer,
};
use fraggrow::workflows::grow::Collaborators;

pub mod grow;
pub mod schedule;
pub mod series;

/// Owns the collaborators one invocation drives; the workflows borrow them.
pub struct Toolchain {
    preparer: Box<dyn StructurePreparer>,
    interpolator: CommandInterpolator,
    configurer: TemplateConfigurer,
    runner: CommandRunner,
    selector: Box<dyn StructureSelector>,
}

impl Toolchain {
    pub fn new(config: &AppConfig, preparer: Box<dyn StructurePreparer>) -> Self {
        let interpolator = CommandInterpolator {
            program: config.interpolator.program.clone(),
            program_args: config.interpolator.args.clone(),
            timeout: config.interpolator.timeout,
        };
        let selector: Box<dyn StructureSelector> = match &config.clusterer {
            Some(tool) => Box::new(CommandClusterer {
                program: tool.program.clone(),
                program_args: tool.args.clone(),
                timeout: tool.timeout,
            }),
            None => Box::new(ReportRankSelector),
        };
        Self {
            preparer,
            interpolator,
            configurer: TemplateConfigurer,
            runner: CommandRunner::from_config(&config.growth.simulation),
            selector,
        }
    }

    pub fn collaborators(&self) -> Collaborators<'_> {
        Collaborators {
            preparer: self.preparer.as_ref(),
            interpolator: &self.interpolator,
            configurer: &self.configurer,
            runner: &self.runner,
            selector: self.selector.as_ref(),
        }
    }
}
