//! Routes and scenarios wired into the console bot.

use std::sync::Arc;

use chatflow_advanced::{AdvancedScenarioConfig, FnScenario};
use chatflow_core::{FlowError, RequestMapping, Response, Result};
use chatflow_router::{Route, RouteTable};
use chatflow_scenario::{
    InMemoryScenarioIdRepository, InMemoryScenarioRepository, ScenarioConfig, ScenarioFactory,
    ScenarioPersister, SimpleScenarioIdResolver, Transition,
};

pub fn routes() -> Result<RouteTable> {
    let mut routes = RouteTable::new();
    routes
        .add(Route::new("start", RequestMapping::command("start")?, |req| {
            let name = req.update().username.clone().unwrap_or_else(|| "there".to_string());
            Ok(Some(Response::text(format!(
                "Hi {name}! Try /survey, /tip or /echo <word>."
            ))))
        }))
        .add(Route::new("echo", RequestMapping::text("/echo {word}")?, |req| {
            let word = req
                .accessor()
                .template_variables()
                .get("word")
                .cloned()
                .unwrap_or_default();
            Ok(Some(Response::text(word)))
        }))
        .add(
            Route::new("stats", RequestMapping::command("stats")?, |req| {
                Ok(Some(Response::text(format!("user {} in chat {}", req.user_id(), req.chat_id()))))
            })
            .with_roles(["admin"]),
        );
    Ok(routes)
}

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Survey {
    Idle,
    AskName,
    AskColor,
    Done,
}

/// Two questions, then back to idle.
pub fn survey() -> Result<ScenarioFactory<Survey>> {
    let config = ScenarioConfig::builder()
        .initial(Survey::Idle)
        .states([Survey::AskName, Survey::AskColor])
        .terminal(Survey::Done)
        .transition(
            Transition::new(Survey::Idle, Survey::AskName)
                .on(RequestMapping::command("survey")?)
                .action(|_| Ok(Some(Response::text("What is your name?")))),
        )
        .transition(
            Transition::new(Survey::AskName, Survey::AskColor)
                .on(RequestMapping::text("{name}")?)
                .action(|ctx| {
                    let name = ctx.variable("name").unwrap_or_default();
                    Ok(Some(Response::text(format!("Nice to meet you, {name}. Favourite colour?"))))
                }),
        )
        .transition(
            Transition::new(Survey::AskColor, Survey::Done)
                .on(RequestMapping::text("{color}")?)
                .prop("reply", "Thanks, survey complete.")
                .action(|ctx| {
                    if ctx.variable("color") == Some("none") {
                        return Err(FlowError::handler("everyone has a favourite colour"));
                    }
                    let reply = ctx.prop("reply").and_then(|v| v.as_str()).unwrap_or("Done.");
                    Ok(Some(Response::text(reply)))
                }),
        )
        .build()?;

    Ok(ScenarioFactory::new(
        config,
        ScenarioPersister::new(Some(Arc::new(InMemoryScenarioRepository::new()))),
        Arc::new(SimpleScenarioIdResolver::new(Some(Arc::new(
            InMemoryScenarioIdRepository::new(),
        )))),
    ))
}

/// `/tip` counts how many tips were shown and hands off to the footer.
pub fn tips() -> Result<Vec<AdvancedScenarioConfig>> {
    let tip = FnScenario::new(vec![RequestMapping::command("tip")?], |ctx| {
        let shown = ctx.get("tips").and_then(|v| v.as_u64()).unwrap_or(0) + 1;
        ctx.set("tips", shown);
        ctx.hand_off("footer");
        Ok(())
    });
    let footer = FnScenario::new(Vec::new(), |ctx| {
        let shown = ctx.get("tips").and_then(|v| v.as_u64()).unwrap_or(0);
        ctx.reply(Response::text(format!(
            "Tip #{shown}: scenario state survives between messages."
        )));
        ctx.end();
        Ok(())
    });
    Ok(vec![
        AdvancedScenarioConfig::new("tip", tip),
        AdvancedScenarioConfig::new("footer", footer),
    ])
}
