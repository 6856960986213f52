//! Prompt text for each model call.
//!
//! Instructions are in English for steadier instruction-following; every
//! user-facing output is requested in Korean.

use nomu_core::{Issue, QaPair, render_qa};

/// Fixed answer when the retrieved provisions do not cover the question.
pub const NOT_IN_PROVIDED_DATA: &str = "해당 내용은 제공된 법령 데이터에 없습니다.";

fn grounding_rule() -> String {
    format!(
        "Ground every statement in the [Provided legal provisions] only. \
         No general knowledge, no speculation. If the provisions do not cover the \
         question, reply with exactly this Korean sentence: \"{NOT_IN_PROVIDED_DATA}\" \
         Cite only article numbers (제N조) and figures that appear in the provisions; \
         never invent them.\n"
    )
}

const LAW_SCOPE: &str = "The provisions may come from several Korean labor laws: \
    근로기준법, 최저임금법, 근로자퇴직급여 보장법, 남녀고용평등법, 기간제법 (individual relations); \
    노동조합법, 근로자참여법 (collective relations); \
    산업안전보건법, 고용보험법, 직업안정법, 산업재해보상보험법 (labor market).\n";

pub fn classification_system() -> String {
    format!(
        "You classify the labor-law issues present in a user's situation.\n{}{}\
         Rules:\n\
         - Only issues the situation states explicitly. Do not infer extra issues.\n\
         - Explicit keywords win: a situation naming 육아휴직, 산재, 산업안전, 노조, or 최저임금 \
         gets that label first even when other issues are present.\n\
         - Each provision starts with [Law name] and [Chapter]; use both to map the situation.\n\
         - Problems of the same kind collapse to one label.\n\
         - Output only labels from the allowed list, never article titles.\n\
         Output: a JSON array of Korean labels, e.g. [\"퇴직금\"] or [\"임금\", \"해고/징계\"].",
        grounding_rule(),
        LAW_SCOPE
    )
}

pub fn classification_user(situation: &str, context: &str, allowed: &[String]) -> String {
    format!(
        "User situation:\n{situation}\n\n\
         [Provided legal provisions]\n{context}\n\n\
         Allowed issue labels (choose only from this list):\n{}\n\n\
         Output a JSON array only.",
        allowed.join(", ")
    )
}

pub fn checklist_system(max_items: usize) -> String {
    format!(
        "You write yes/no fact-finding checklists from statute provisions for people \
         without legal training.\n{}\
         Rules:\n\
         1. Ask only about the user's own facts, never about what the law says. \
         Patterns: \"~한 적 있나요?\", \"~하고 있나요?\", \"~했나요?\", \"~받았나요?\".\n\
         2. Everyday words instead of legal terms: \"월급\" not \"임금 지급 의무\", \
         \"계약서\" not \"근로계약서에 명시된 사항\", \"해고당한 이유\" not \"해고 사유\".\n\
         3. One fact per question, concrete and specific, no assumptions.\n\
         4. At most {max_items} items, no repeated topics.\n\
         Without [Previous Q&A] this is round 1: short fact checks. With [Previous Q&A], \
         ask follow-ups only for items answered \"네\".\n\
         Output: JSON array [{{\"item\": \"...\", \"question\": \"...\"}}] in Korean. \
         \"item\" is a short descriptive title (not a number); \"question\" is the full question.",
        grounding_rule()
    )
}

pub fn checklist_user(issue: &Issue, summary: &str, context: &str, prior_qa: &[QaPair]) -> String {
    let (previous, round_rule) = if prior_qa.is_empty() {
        (
            String::new(),
            "Round 1: simple everyday Korean only, one fact per question, each topic once.",
        )
    } else {
        (
            format!(
                "\n[Previous Q&A]\nFollow up only on items answered \"네\"; skip \"아니요\" and \
                 \"모르겠음\". New questions may assume the \"네\" fact \
                 (e.g. \"그런 경우 …\", \"그렇다면 …\").\n{}\n",
                render_qa(prior_qa)
            ),
            "Later round: only follow-ups to items answered 네, in everyday Korean.",
        )
    };
    format!(
        "Issue: {issue}\n{previous}\n\
         [Retrieved provisions]\n{summary}\n\n\
         [Full provision text]\n{context}\n\n\
         Generate the checklist. {round_rule} Write every \"item\" and \"question\" in Korean."
    )
}

pub fn continuation_system() -> &'static str {
    "Decide from the Q&A whether more checklist questions are needed before a legal \
     conclusion. Return only JSON: {\"should_continue\": true/false, \"reason\": \"한 문장\"}. \
     true only when a fact critical to the conclusion is still missing. Be strict; \
     avoid extra rounds."
}

pub fn continuation_user(issue: &Issue, qa: &[QaPair], context: &str) -> String {
    format!(
        "Issue: {issue}\n\n[Q&A]\n{}\n\n[Provisions summary]\n{context}\n\n\
         Need more questions? Return JSON only: {{\"should_continue\": true/false, \"reason\": \"한 문장\"}}",
        render_qa(qa)
    )
}

pub fn conclusion_system() -> String {
    format!(
        "You are a labor-law advisor giving practical guidance grounded in Korean statutes.\n{}{}\
         Structure the answer:\n\
         1. A one or two sentence summary of the user's situation and the key legal point.\n\
         2. Legal basis with citations. Every citation carries its law name: \
         \"근로기준법 제36조\", \"최저임금법 제5조\".\n\
         3. What it means for this user, based on their Q&A answers.\n\
         4. Concrete next steps as a numbered or bulleted list.\n\
         5. Deadlines, warnings, or other notes.\n\
         Address the user as \"귀하\", keep the language plain, and use **bold** for key points. \
         Do not add figures or interpretations that are not in the provisions. \
         Write the conclusion in Korean.",
        grounding_rule(),
        LAW_SCOPE
    )
}

/// Everything the conclusion prompt is built from.
pub struct ConclusionInputs<'a> {
    pub issue: &'a Issue,
    pub qa: &'a [QaPair],
    pub context: &'a str,
    pub decree_context: &'a str,
    pub precedents: &'a str,
    /// Related articles present in the context, e.g. "근로기준법 제27조".
    pub related_hint: &'a [String],
    /// Law names appearing in the evidence.
    pub law_names: &'a [String],
}

pub fn conclusion_user(inputs: &ConclusionInputs<'_>) -> String {
    let qa = if inputs.qa.is_empty() {
        "(없음)".to_string()
    } else {
        render_qa(inputs.qa)
    };
    let mut out = format!(
        "Issue: {}\n\n[User's Q&A]\n{qa}\n\n[Provided legal provisions]\n{}\n",
        inputs.issue, inputs.context
    );
    if !inputs.decree_context.is_empty() {
        out.push_str(&format!(
            "\n[Enforcement decrees and rules]\n{}\n",
            inputs.decree_context
        ));
    }
    if !inputs.precedents.is_empty() {
        out.push_str(&format!(
            "\n[Precedents and interpretations, for reference only]\n{}\n",
            inputs.precedents
        ));
    }
    if !inputs.related_hint.is_empty() {
        out.push_str(&format!(
            "\n[Related articles] You may close with \"참고로 관련된 {}도 함께 확인해 보시기 바랍니다.\"\n",
            inputs.related_hint.join(", ")
        ));
    }
    if !inputs.law_names.is_empty() {
        out.push_str("\nCitation format per law:\n");
        for law in inputs.law_names {
            out.push_str(&format!("- [{law}] articles as '{law} 제N조'\n"));
        }
    }
    out.push_str(
        "\nEvery article citation MUST include the law name. Base the conclusion on both the \
         provisions and the user's Q&A, with practical steps that fit their situation. \
         Write in Korean.",
    );
    out
}
