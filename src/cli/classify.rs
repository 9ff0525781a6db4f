use spendwise::categorizer::ClassificationMethod;
use spendwise::error::Result;

use super::open;

pub fn run(user: Option<&str>, merchant: &str, hint: Option<&str>) -> Result<()> {
    let ctx = open(user)?;
    let classification = ctx.classifier()?.classify(merchant, hint, None);

    println!("Category:    {}", classification.category);
    println!("Confidence:  {}%", classification.confidence);
    match classification.method {
        ClassificationMethod::CustomRule(id) => println!("Matched by:  rule {id}"),
        other => println!("Matched by:  {}", other.label()),
    }
    Ok(())
}
