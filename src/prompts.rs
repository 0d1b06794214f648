// 📝 Prompt templates
// Pure string builders. Every model call is single-shot: no conversation state.

use chrono::NaiveDate;

use crate::documents::DocumentKind;

/// Role framing placed ahead of each per-document summary prompt
fn role_preamble(kind: DocumentKind) -> Option<&'static str> {
    let preamble = match kind {
        DocumentKind::Identity => "You are an AI document assistant. The following text is an **identification document**.
- Extract key details like Name, DOB, Address, ID number.
- Ensure responses are **fact-based** and avoid making assumptions.",
        DocumentKind::SaleDeed => "You are a legal AI assistant. The following text is a **sale deed**.
- Extract key legal information like property details, buyer/seller details, and ownership clauses.
- Avoid making any legal interpretations beyond the document.",
        DocumentKind::CreditReport => "You are a credit analysis AI. The following text is a **credit score report**.
- Extract important details like credit score, factors affecting the score, and recommendations.
- If a table is found, interpret it as a **credit history summary**.",
        DocumentKind::BankStatement => return None,
    };
    Some(preamble)
}

fn sale_deed_body(text: &str) -> String {
    format!(
        "You are analyzing a **Sale Deed** document.

Extract and summarize in great detail:
- **Seller Name**
- **Buyer Name**
- **Property Address**
- **Exact Sale Amount and Payment Terms** (e.g., lump sum or installments).
- **Date of Sale**
- **Additional Conditions**, such as ownership transfer clauses or maintenance responsibilities.

**Extracted Sale Deed:**
{text}

Provide a **human-readable summary**."
    )
}

fn credit_report_body(text: &str) -> String {
    format!(
        "You are analyzing a **Credit Score Report**.

Extract and summarize:
- **Credit Score Breakdown**: Explain how the score was calculated and what it indicates.
- **Credit Utilization**: Describe the current balance-to-limit ratio and its impact.
- **Loan Repayment History**: Highlight past loans, late payments, and their effect.
- **Outstanding Loans & Debt Status**: Mention amounts due, interest rates, and terms.
- **Risk Level Assessment**: Based on the report, classify the customer as Low, Medium, or High risk.

**Extracted Credit Report:**
{text}

Provide a **human-readable summary**."
    )
}

fn identity_body(text: &str) -> String {
    format!(
        "You are analyzing an **Identification Document**.

Extract and summarize:
- **Full Name**
- **Date of Birth**
- **ID Number (Passport, National ID)**
- **Address**
- **Issuing Authority**

**Extracted ID Document:**
{text}

Provide a **human-readable summary** with the title name **Summary**."
    )
}

/// Summary prompt for one document's extracted text.
/// Bank statements have none: their summary is the computed analysis.
pub fn summary_prompt(kind: DocumentKind, text: &str) -> Option<String> {
    let preamble = role_preamble(kind)?;
    let body = match kind {
        DocumentKind::Identity => identity_body(text),
        DocumentKind::SaleDeed => sale_deed_body(text),
        DocumentKind::CreditReport => credit_report_body(text),
        DocumentKind::BankStatement => return None,
    };
    Some(format!("{}\n\n{}", preamble, body))
}

/// Yes/no name cross-check between the ID summary and another document
pub fn name_match_prompt(identity_details: &str, doc_text: &str, kind: DocumentKind) -> String {
    let label = kind.label();
    format!(
        "Verify if the customer name in this {label} matches the name extracted from the Identification Document.

**Extracted {label} Text:**
{doc_text}

**Customer Identity Details:**
{identity_details}

Return **YES or NO**, and provide a short reason."
    )
}

/// RM-facing profile synthesis over the per-document summaries (as JSON)
pub fn profile_prompt(profile_json: &str, today: NaiveDate) -> String {
    format!(
        "You are a **Relationship Manager (RM)** at a bank, evaluating a customer's profile based on key financial and identification documents.

**Documents Available:**
- Sale Deed (Property ownership details)
- Credit Score Report (Financial standing and risk analysis)
- Bank Statement (Cash flow & spending habits)

**Based on these, provide a structured assessment including:**
1. **Customer Identity & Property Ownership**
2. **Creditworthiness & Loan Eligibility**
3. **Financial Stability & Spending Behavior**
4. **Potential Risks & Red Flags**
5. **Recommendations for Banking Products (Loans, Credit Cards, Investment Advice, etc.)**

**Extracted Data:**
{profile_json}

**Format the output as a structured and professional RM assessment.**
**Today's date is {today}. Don't mention the customer's ID here or the RM name.**"
    )
}

/// Free-text question over the profile data
pub fn query_prompt(profile_json: &str, question: &str) -> String {
    format!(
        "You are an AI assistant for Relationship Managers. Using the following customer profile data, answer the given question concisely.

**Customer Profile:**
{profile_json}

**Question:**
{question}

**Provide a clear and precise response.**"
    )
}
