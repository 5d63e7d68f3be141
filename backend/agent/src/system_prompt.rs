//! Prompt builders for verse turns and the judge.

use poemforge_core::Criterion;

const VERSE_RULES: &str = "You are a talented poet. Create ONE poetic line that:
1. Is factually grounded in the provided context
2. Flows naturally with previous lines (if any)
3. Uses vivid imagery and literary devices
4. Maintains consistent rhythm and theme
5. Is creative yet truthful to the facts";

/// System prompt for one verse turn. `prior` is every earlier verse in order.
pub fn verse_system_prompt(facts: &[String], prior: &[&str]) -> String {
    let conversation = if prior.is_empty() {
        "This is the first line.".to_string()
    } else {
        prior
            .iter()
            .enumerate()
            .map(|(i, verse)| format!("Line {}: {}", i + 1, verse))
            .collect::<Vec<_>>()
            .join("\n")
    };

    format!(
        "{VERSE_RULES}\n\nContext Facts:\n{}\n\nPrevious Lines:\n{conversation}\n\n\
         Create the next line of the poem. Output ONLY the verse, nothing else.",
        facts.join("\n")
    )
}

pub fn verse_user_prompt(context: &str) -> String {
    format!("Create the next poetic line based on: {context}")
}

/// `1. first verse\n2. second verse`
pub fn numbered<S: AsRef<str>>(verses: &[S]) -> String {
    verses
        .iter()
        .enumerate()
        .map(|(i, v)| format!("{}. {}", i + 1, v.as_ref()))
        .collect::<Vec<_>>()
        .join("\n")
}

fn rubric() -> String {
    let details: [&str; 5] = [
        "   - Are verses grounded in the provided facts?\n   - Any factual errors or unsupported claims?",
        "   - Use of metaphors, similes, and imagery\n   - Literary devices (alliteration, personification, etc.)\n   - Emotional resonance",
        "   - Do verses flow naturally?\n   - Consistent theme throughout?\n   - Logical progression",
        "   - Originality of expression\n   - Unique perspective\n   - Avoidance of clichés",
        "   - Musicality and meter\n   - Phonetic appeal\n   - Internal rhyme/assonance",
    ];
    Criterion::ALL
        .iter()
        .zip(details)
        .enumerate()
        .map(|(i, (c, detail))| {
            format!(
                "{}. {} ({} points):\n{detail}\n   - Score: 0-{}",
                i + 1,
                c.label().to_uppercase(),
                c.max_points(),
                c.max_points()
            )
        })
        .collect::<Vec<_>>()
        .join("\n\n")
}

fn score_block(poem: &str) -> String {
    let lines = Criterion::ALL
        .iter()
        .map(|c| format!("{}: X/{}", c.label(), c.max_points()))
        .collect::<Vec<_>>()
        .join("\n");
    format!("POEM {poem} SCORES:\n{lines}\nTOTAL: X/100")
}

pub fn judge_system_prompt(facts: &[String]) -> String {
    format!(
        "You are an expert poetry critic and judge. Evaluate two poems based on:\n\n\
         JUDGING CRITERIA (Total: 100 points):\n\n{}\n\n\
         Provide your judgment in this EXACT format:\n\n{}\n\n{}\n\n\
         WINNER: [Poem A or Poem B]\n\n\
         JUSTIFICATION:\n[2-3 sentences explaining the decision]\n\n\
         STRENGTHS OF WINNER:\n- [Point 1]\n- [Point 2]\n\n\
         AREAS FOR IMPROVEMENT:\n- [Point 1]\n- [Point 2]\n\n\
         Source Facts for Verification:\n{}",
        rubric(),
        score_block("A"),
        score_block("B"),
        facts.join("\n")
    )
}

pub fn judge_user_prompt(
    label_a: &str,
    poem_a: &[&str],
    label_b: &str,
    poem_b: &[&str],
    context: &str,
) -> String {
    format!(
        "Poem A ({label_a}):\n{}\n\nPoem B ({label_b}):\n{}\n\nContext: {context}\n\nJudge these poems.",
        numbered(poem_a),
        numbered(poem_b)
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn first_turn_says_so() {
        let p = verse_system_prompt(&["Bees dance.".into()], &[]);
        assert!(p.contains("Context Facts:\nBees dance."));
        assert!(p.contains("Previous Lines:\nThis is the first line."));
    }

    #[test]
    fn prior_lines_are_numbered_in_order() {
        let p = verse_system_prompt(&[], &["alpha", "beta"]);
        assert!(p.contains("Line 1: alpha\nLine 2: beta"));
    }

    #[test]
    fn judge_prompt_lists_every_criterion_with_max() {
        let p = judge_system_prompt(&["fact".into()]);
        for c in Criterion::ALL {
            assert!(p.contains(&format!("{}: X/{}", c.label(), c.max_points())));
        }
        assert!(p.contains("POEM A SCORES:") && p.contains("POEM B SCORES:"));
        assert!(p.ends_with("Source Facts for Verification:\nfact"));
    }

    #[test]
    fn user_prompt_numbers_each_poem() {
        let p = judge_user_prompt("Gemini", &["x", "y"], "Llama", &["z"], "ctx");
        assert!(p.starts_with("Poem A (Gemini):\n1. x\n2. y\n\nPoem B (Llama):\n1. z"));
    }
}
