//! PDF.co document conversion and editing.
//!
//! Every operation is a JSON POST.  Inputs named `url` accept either a
//! public URL or base64 content; lists of inputs are joined with commas.

use serde_json::json;

use crate::config::ProviderSettings;
use crate::credentials::{Credential, Env, require};
use crate::error::Result;
use crate::operation::{Operation, Provider};
use crate::params::{Args, Param, ParamKind};
use crate::payload::ParamSet;
use crate::request::{RequestDescriptor, TimeoutClass};
use crate::traits::AdapterType;

const DEFAULT_BASE_URL: &str = "https://api.pdf.co/v1";

/// PDF.co provider context.
pub struct PdfCo {
    key: Credential,
    base_url: String,
}

type Op = Operation<PdfCo>;

impl PdfCo {
    /// Conversions default to the long timeout.
    fn post(&self, path: &str, body: ParamSet) -> RequestDescriptor {
        RequestDescriptor::post(format!("{}{path}", self.base_url))
            .secret_header("x-api-key", self.key.expose())
            .timeout(TimeoutClass::Long)
            .json_params(body)
    }
}

fn source(op: Op) -> Op {
    op.param(Param::string("url").required().describe("URL or base64-encoded PDF"))
}

fn paged_source(op: Op) -> Op {
    source(op).param(Param::string("pages").describe("e.g. \"1-3\" or \"1,3,5\""))
}

fn joined(a: &Args, key: &str) -> Result<Option<String>> {
    Ok(a.str_list(key)?.map(|items| items.join(",")))
}

fn layout(op: Op, name: &'static str) -> Op {
    op.param(Param::string("name").default(name))
        .param(Param::string("orientation").default("Portrait").one_of(&["Portrait", "Landscape"]))
        .param(Param::string("page_size").default("Letter"))
}

fn layout_fields(a: &Args) -> ParamSet {
    ParamSet::new()
        .forward_all(a, &["name", "orientation"])
        .forward_as(a, "page_size", "pageSize")
}

impl Provider for PdfCo {
    const ID: &'static str = "pdfco";
    const ADAPTER_TYPE: AdapterType = AdapterType::Documents;
    const ENV_VARS: &'static [&'static str] = &["PDFCO_API_KEY"];

    fn from_env(env: &dyn Env, settings: &ProviderSettings) -> Result<Self> {
        Ok(Self {
            key: require(env, Self::ID, "PDFCO_API_KEY")?,
            base_url: settings.base_url_or(DEFAULT_BASE_URL),
        })
    }

    fn operations() -> Vec<Op> {
        vec![
            // -- Conversion from PDF --
            paged_source(Op::new("pdfco_pdf_to_text", "Extract plain text"))
                .param(Param::boolean("async_mode").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_all(a, &["url", "pages"])
                        .forward_as(a, "async_mode", "async");
                    Ok(cx.post("/pdf/convert/to/text", body))
                }),
            paged_source(Op::new("pdfco_pdf_to_json", "Extract structured JSON"))
                .request(|cx, a| {
                    Ok(cx.post("/pdf/convert/to/json", ParamSet::new().forward_all(a, &["url", "pages"])))
                }),
            paged_source(Op::new("pdfco_pdf_to_html", "Convert to HTML"))
                .param(Param::boolean("simple").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["url", "pages", "simple"]);
                    Ok(cx.post("/pdf/convert/to/html", body))
                }),
            paged_source(Op::new("pdfco_pdf_to_csv", "Extract tables as CSV"))
                .request(|cx, a| {
                    Ok(cx.post("/pdf/convert/to/csv", ParamSet::new().forward_all(a, &["url", "pages"])))
                }),
            // -- Page operations --
            Op::new("pdfco_pdf_merge", "Merge several PDFs into one")
                .param(Param::array("urls", ParamKind::String).required())
                .param(Param::string("name").default("merged.pdf"))
                .param(Param::boolean("async_mode").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .maybe("url", joined(a, "urls")?)
                        .forward(a, "name")
                        .forward_as(a, "async_mode", "async");
                    Ok(cx.post("/pdf/merge", body))
                }),
            paged_source(Op::new("pdfco_pdf_split", "Split by page ranges or into single pages"))
                .param(Param::boolean("split_by_pages").default(false))
                .request(|cx, a| {
                    let by_pages = a.bool_or("split_by_pages", false)?.then_some(true);
                    let body = ParamSet::new()
                        .forward_all(a, &["url", "pages"])
                        .maybe("splitByPages", by_pages);
                    Ok(cx.post("/pdf/split", body))
                }),
            source(Op::new("pdfco_pdf_info", "Page count, metadata and security flags"))
                .request(|cx, a| {
                    Ok(cx
                        .post("/pdf/info", ParamSet::new().forward(a, "url"))
                        .timeout(TimeoutClass::Standard))
                }),
            paged_source(Op::new("pdfco_pdf_rotate", "Rotate pages"))
                .param(Param::integer("angle").required().describe("90, 180, 270 or -90"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["url", "angle", "pages"]);
                    Ok(cx.post("/pdf/edit/rotate", body))
                }),
            // -- Conversion to PDF --
            layout(Op::new("pdfco_html_to_pdf", "Render HTML to PDF"), "document.pdf")
                .param(Param::string("html").required())
                .param(Param::string("margins").describe("\"top,right,bottom,left\""))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "html")
                        .extend(layout_fields(a))
                        .forward(a, "margins");
                    Ok(cx.post("/pdf/convert/from/html", body))
                }),
            layout(Op::new("pdfco_url_to_pdf", "Render a web page to PDF"), "webpage.pdf")
                .param(Param::string("url").required())
                .request(|cx, a| {
                    let body = ParamSet::new().forward(a, "url").extend(layout_fields(a));
                    Ok(cx.post("/pdf/convert/from/url", body))
                }),
            Op::new("pdfco_image_to_pdf", "Combine images into a PDF")
                .param(Param::array("images", ParamKind::String).required())
                .param(Param::string("name").default("images.pdf"))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .maybe("url", joined(a, "images")?)
                        .forward(a, "name");
                    Ok(cx.post("/pdf/convert/from/image", body))
                }),
            // -- Editing and security --
            source(Op::new("pdfco_pdf_add_watermark", "Stamp text onto pages"))
                .param(Param::string("text").required())
                .param(Param::integer("x").default(100))
                .param(Param::integer("y").default(100))
                .param(Param::integer("font_size").default(24))
                .param(Param::string("color").default("FF0000").describe("Hex without #"))
                .param(Param::number("opacity").default(0.5))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward_all(a, &["url", "text", "x", "y"])
                        .forward_as(a, "font_size", "fontSize")
                        .forward_all(a, &["color", "opacity"]);
                    Ok(cx.post("/pdf/edit/add-text", body))
                }),
            source(Op::new("pdfco_pdf_compress", "Reduce file size"))
                .param(
                    Param::string("compression_level")
                        .default("balanced")
                        .one_of(&["low", "balanced", "high", "extreme"]),
                )
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "url")
                        .forward_as(a, "compression_level", "compressionLevel");
                    Ok(cx.post("/pdf/optimize", body))
                }),
            source(Op::new("pdfco_pdf_protect", "Add password protection"))
                .param(Param::string("owner_password").required())
                .param(Param::string("user_password"))
                .param(Param::boolean("allow_print").default(true))
                .param(Param::boolean("allow_copy").default(false))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "url")
                        .forward_as(a, "owner_password", "ownerPassword")
                        .forward_as(a, "allow_print", "allowPrint")
                        .forward_as(a, "allow_copy", "allowCopy")
                        .forward_as(a, "user_password", "userPassword");
                    Ok(cx.post("/pdf/security/add", body))
                }),
            source(Op::new("pdfco_pdf_unlock", "Remove password protection"))
                .param(Param::string("password").required())
                .request(|cx, a| {
                    Ok(cx.post("/pdf/security/remove", ParamSet::new().forward_all(a, &["url", "password"])))
                }),
            // -- Barcodes and OCR --
            Op::new("pdfco_barcode_generate", "Render a barcode image")
                .param(Param::string("value").required())
                .param(Param::string("barcode_type").default("QRCode"))
                .param(Param::string("format").default("png").one_of(&["png", "jpg", "svg"]))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "value")
                        .forward_as(a, "barcode_type", "type")
                        .forward(a, "format");
                    Ok(cx.post("/barcode/generate", body).timeout(TimeoutClass::Standard))
                }),
            Op::new("pdfco_barcode_read", "Decode barcodes in an image")
                .param(Param::string("url").required())
                .param(Param::array("barcode_types", ParamKind::String))
                .request(|cx, a| {
                    let body = ParamSet::new()
                        .forward(a, "url")
                        .maybe("types", joined(a, "barcode_types")?);
                    Ok(cx.post("/barcode/read/from/url", body).timeout(TimeoutClass::Standard))
                }),
            paged_source(Op::new("pdfco_ocr_pdf", "Make a scanned PDF searchable"))
                .param(Param::string("lang").default("eng"))
                .request(|cx, a| {
                    let body = ParamSet::new().forward_all(a, &["url", "lang", "pages"]);
                    Ok(cx.post("/pdf/ocr", body).timeout(TimeoutClass::Heavy))
                }),
        ]
    }
}
