use std::env;
use std::io::{self, BufRead, Write};

use lawbot_agent::LawAgent;
use lawbot_cli::{bootstrap, build_agent, display_detailed_retrieval, display_result};

const HELP: &str = "
📖 可用指令:
- 直接輸入法律問題進行查詢
- 'detailed' + 問題: 顯示詳細檢索過程
- 'help': 顯示此幫助資訊
- 'quit' 或 'exit': 離開程式

🎯 範例問題:
- 某人故意殺害他人，應該如何論處？
- 甲竊取他人財物後被發現，為了脫免逮捕而使用暴力
- 什麼是準強盜罪？
- 竊盜罪的構成要件有哪些？
";

fn usage(prog: &str) -> ! {
    eprintln!("Usage: {} [ask [--detailed] \"<question>\" | classify \"<question>\"]", prog);
    eprintln!("       {}            (interactive mode)", prog);
    std::process::exit(1);
}

async fn ask(agent: &LawAgent, question: &str, detailed: bool) {
    let result = agent.answer(question).await;
    display_result(&result);
    if detailed {
        display_detailed_retrieval(&result);
    }
}

async fn interactive(agent: &LawAgent) -> anyhow::Result<()> {
    println!("⚖️ 法律機器人代理已啟動");
    println!("輸入 'quit' 或 'exit' 離開");
    println!("輸入 'help' 查看可用指令");
    println!("{}", "-".repeat(50));

    let stdin = io::stdin();
    let mut line = String::new();
    loop {
        print!("\n🔍 請輸入您的法律問題: ");
        io::stdout().flush()?;
        line.clear();
        if stdin.lock().read_line(&mut line)? == 0 {
            println!("\n👋 再見！");
            break;
        }
        let input = line.trim();
        if input.is_empty() {
            continue;
        }
        match input.to_lowercase().as_str() {
            "quit" | "exit" | "退出" => {
                println!("👋 再見！");
                break;
            }
            "help" | "幫助" => {
                println!("{}", HELP);
                continue;
            }
            _ => {}
        }
        match input.strip_prefix("detailed ") {
            Some(question) => ask(agent, question.trim(), true).await,
            None => ask(agent, input, false).await,
        }
    }
    Ok(())
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let args: Vec<String> = env::args().collect();
    let settings = bootstrap()?;
    let agent = build_agent(&settings).map_err(|e| {
        eprintln!("❌ 初始化失敗: {}", e);
        eprintln!("請檢查 {} 是否已正確設定", settings.llm.api_key_env);
        e
    })?;

    match args.get(1).map(String::as_str) {
        None => interactive(&agent).await?,
        Some("ask") => {
            let detailed = args.iter().skip(2).any(|a| a == "--detailed" || a == "-d");
            let question = args.iter().skip(2).find(|a| !a.starts_with('-')).unwrap_or_else(|| usage(&args[0]));
            ask(&agent, question, detailed).await;
        }
        Some("classify") => {
            let question = args.get(2).unwrap_or_else(|| usage(&args[0]));
            match agent.classify(question).await {
                Ok(decision) => {
                    println!("🎯 主題: {}", decision.label);
                    println!("💭 理由: {}", decision.rationale.as_deref().unwrap_or("無法提供推理過程"));
                }
                Err(e) => {
                    eprintln!("❌ 分類失敗: {}", e);
                    std::process::exit(1);
                }
            }
        }
        Some(_) => usage(&args[0]),
    }
    Ok(())
}
