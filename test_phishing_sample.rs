#![allow(clippy::uninlined_format_args)]

use phishgate::{Analyzer, Config, ParsedMessage, Verdict};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    env_logger::init();

    println!("Testing a canned credential-phishing sample...");

    let config_yaml = r#"
heuristics:
  extra_phrases:
    - "wallet"
reputation:
  enabled: false
"#;
    let config: Config = serde_yaml::from_str(config_yaml)?;
    let analyzer = Analyzer::from_config(&config)?;

    let raw = concat!(
        "Received-SPF: fail (example.net: domain of secure-paypa1.com does not designate 203.0.113.9)\r\n",
        "From: PayPal Security <alert@secure-paypa1.com>\r\n",
        "Reply-To: <recovery@mailbox-help.ru>\r\n",
        "To: customer@example.com\r\n",
        "Subject: Action required: your account has been suspended\r\n",
        "Content-Type: text/plain; charset=utf-8\r\n",
        "\r\n",
        "URGENT!!! We detected unusual activity on your account.\r\n",
        "Verify your account immediately or it stays suspended:\r\n",
        "http://192.168.10.20/paypal/login.php\r\n",
        "http://secure.login.account.paypal.verify.example.com/reset\r\n",
    );

    let message = ParsedMessage::parse_eml_bytes(raw.as_bytes());
    println!("Subject: {}", message.subject);
    println!("From: {}", message.from_address);
    println!("URLs: {:?}", message.urls);

    let result = analyzer.analyze(&message).await;
    println!();
    println!("{}", serde_json::to_string_pretty(&result)?);
    println!();

    match result.verdict {
        Verdict::Allow => println!("❌ Sample was allowed, check the heuristics"),
        verdict => println!("✅ Sample caught with verdict {}", verdict),
    }

    Ok(())
}
