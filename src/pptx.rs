// ABOUTME: PPTX generation module for the deckling application
// ABOUTME: Serializes a finished presentation into a PresentationML package

use crate::errors::{DeckError, Result};
use crate::layout::inches_to_emu;
use crate::slide::{
    Align, Background, Bullet, Color, Frame, Geometry, ImageData, ImageKind, Paragraph, Picture, Presentation,
    RunStyle, ShapeBox, SlideElement, SlideSpec, TextBox,
};
use crate::utils;
use log::{debug, info, warn};
use quick_xml::escape::escape;
use std::fs;
use std::io::{BufWriter, Seek, Write};
use std::path::Path;
use zip::result::ZipResult;
use zip::{write::FileOptions, ZipWriter};

const NS_DECL: &str = r#"xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" xmlns:r="http://schemas.openxmlformats.org/officeDocument/2006/relationships" xmlns:p="http://schemas.openxmlformats.org/presentationml/2006/main""#;
const XML_HEADER: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>"#;
const REL_BASE: &str = "http://schemas.openxmlformats.org/officeDocument/2006/relationships";
const APPLICATION: &str = "deckling";

/// Write the presentation to `output` without ever exposing a partial file.
///
/// The package goes to a staging file next to `output` first and is renamed
/// over it once complete; on failure the staging file is removed.
pub fn save_pptx(presentation: &Presentation, output: &Path) -> Result<()> {
    let write_failed = |message: String| DeckError::WriteFailed {
        path: output.to_path_buf(),
        message,
    };

    utils::ensure_parent_directory_exists(output).map_err(|e| write_failed(e.to_string()))?;
    let staging = utils::staging_path(output);
    debug!("Staging PPTX at {:?}", staging);

    match write_staged(presentation, &staging, output) {
        Ok(()) => {
            info!("PPTX file created at {:?}", output);
            Ok(())
        }
        Err(e) => {
            if staging.exists() {
                if let Err(err) = fs::remove_file(&staging) {
                    warn!("Failed to clean up staging file {:?}: {}", staging, err);
                }
            }
            Err(write_failed(e.to_string()))
        }
    }
}

fn write_staged(presentation: &Presentation, staging: &Path, output: &Path) -> ZipResult<()> {
    let file = fs::File::create(staging)?;
    let writer = write_pptx(presentation, BufWriter::new(file))?;
    let file = writer.into_inner().map_err(|e| e.into_error())?;
    file.sync_all()?;
    fs::rename(staging, output)?;
    Ok(())
}

/// Serialize the presentation as a PPTX package into `writer`.
pub fn write_pptx<W: Write + Seek>(presentation: &Presentation, writer: W) -> ZipResult<W> {
    let mut zip = ZipWriter::new(writer);
    let slides = presentation.slides();

    info!("Creating PPTX structure for {} slides", slides.len());

    put(&mut zip, "[Content_Types].xml", &content_types_xml(slides.len()))?;
    put(&mut zip, "_rels/.rels", ROOT_RELS)?;
    put(&mut zip, "docProps/app.xml", &app_xml(slides.len()))?;
    put(&mut zip, "docProps/core.xml", &core_xml(presentation))?;
    put(
        &mut zip,
        "ppt/_rels/presentation.xml.rels",
        &presentation_rels_xml(slides.len()),
    )?;
    put(&mut zip, "ppt/presentation.xml", &presentation_xml(presentation))?;
    put(&mut zip, "ppt/presProps.xml", &format!("{}\n<p:presentationPr {}/>", XML_HEADER, NS_DECL))?;
    put(&mut zip, "ppt/viewProps.xml", &view_props_xml())?;
    put(&mut zip, "ppt/tableStyles.xml", TABLE_STYLES)?;
    put(&mut zip, "ppt/theme/theme1.xml", THEME)?;
    put(&mut zip, "ppt/slideMasters/slideMaster1.xml", &slide_master_xml())?;
    put(
        &mut zip,
        "ppt/slideMasters/_rels/slideMaster1.xml.rels",
        &relationships(&[
            ("rId1", "slideLayout", "../slideLayouts/slideLayout1.xml"),
            ("rId2", "theme", "../theme/theme1.xml"),
        ]),
    )?;
    put(&mut zip, "ppt/slideLayouts/slideLayout1.xml", &slide_layout_xml())?;
    put(
        &mut zip,
        "ppt/slideLayouts/_rels/slideLayout1.xml.rels",
        &relationships(&[("rId1", "slideMaster", "../slideMasters/slideMaster1.xml")]),
    )?;

    let mut image_counter = 0;
    for (i, slide) in slides.iter().enumerate() {
        let slide_num = i + 1;
        info!("Creating slide XML: ppt/slides/slide{}.xml", slide_num);

        let mut media = SlideMedia::new(&mut image_counter);
        let xml = slide_xml(slide, &mut media);

        for (name, image) in &media.images {
            debug!("Adding image to PPTX: ppt/media/{}", name);
            zip.start_file(format!("ppt/media/{}", name), FileOptions::default())?;
            zip.write_all(&image.bytes)?;
        }
        put(
            &mut zip,
            &format!("ppt/slides/_rels/slide{}.xml.rels", slide_num),
            &media.rels_xml(),
        )?;
        put(&mut zip, &format!("ppt/slides/slide{}.xml", slide_num), &xml)?;
    }

    info!("Finalizing PPTX file");
    zip.finish()
}

fn put<W: Write + Seek>(zip: &mut ZipWriter<W>, name: &str, content: &str) -> ZipResult<()> {
    zip.start_file(name, FileOptions::default())?;
    zip.write_all(content.as_bytes())?;
    Ok(())
}

/// Escape text for XML, dropping characters XML 1.0 cannot carry.
fn xml_text(text: &str) -> String {
    let cleaned: String = text
        .chars()
        .filter(|c| !c.is_control() || *c == '\t')
        .collect();
    escape(&cleaned).into_owned()
}

fn relationships(entries: &[(&str, &str, &str)]) -> String {
    let mut xml = format!(
        "{}\n<Relationships xmlns=\"http://schemas.openxmlformats.org/package/2006/relationships\">",
        XML_HEADER
    );
    for (id, kind, target) in entries {
        xml.push_str(&format!(
            r#"<Relationship Id="{}" Type="{}/{}" Target="{}"/>"#,
            id, REL_BASE, kind, target
        ));
    }
    xml.push_str("</Relationships>");
    xml
}

const ROOT_RELS: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<Relationships xmlns="http://schemas.openxmlformats.org/package/2006/relationships">
    <Relationship Id="rId1" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/officeDocument" Target="ppt/presentation.xml"/>
    <Relationship Id="rId2" Type="http://schemas.openxmlformats.org/package/2006/relationships/metadata/core-properties" Target="docProps/core.xml"/>
    <Relationship Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/extended-properties" Target="docProps/app.xml"/>
</Relationships>"#;

fn content_types_xml(slide_count: usize) -> String {
    let defaults = [ImageKind::Png, ImageKind::Jpeg, ImageKind::Gif, ImageKind::Bmp]
    .iter()
    .map(|kind| {
        format!(
            r#"    <Default Extension="{}" ContentType="{}"/>"#,
            kind.extension(),
            kind.content_type()
        )
    })
    .collect::<Vec<String>>()
    .join("\n");

    let pml = "application/vnd.openxmlformats-officedocument.presentationml";
    let slides = (1..=slide_count)
        .map(|i| {
            format!(
                r#"    <Override PartName="/ppt/slides/slide{}.xml" ContentType="{}.slide+xml"/>"#,
                i, pml
            )
        })
        .collect::<Vec<String>>()
        .join("\n");

    format!(
        r#"{header}
<Types xmlns="http://schemas.openxmlformats.org/package/2006/content-types">
    <Default Extension="xml" ContentType="application/xml"/>
    <Default Extension="rels" ContentType="application/vnd.openxmlformats-package.relationships+xml"/>
{defaults}
    <Override PartName="/ppt/presentation.xml" ContentType="{pml}.presentation.main+xml"/>
    <Override PartName="/ppt/slideMasters/slideMaster1.xml" ContentType="{pml}.slideMaster+xml"/>
    <Override PartName="/ppt/slideLayouts/slideLayout1.xml" ContentType="{pml}.slideLayout+xml"/>
    <Override PartName="/ppt/presProps.xml" ContentType="{pml}.presProps+xml"/>
    <Override PartName="/ppt/viewProps.xml" ContentType="{pml}.viewProps+xml"/>
    <Override PartName="/ppt/tableStyles.xml" ContentType="{pml}.tableStyles+xml"/>
    <Override PartName="/ppt/theme/theme1.xml" ContentType="application/vnd.openxmlformats-officedocument.theme+xml"/>
    <Override PartName="/docProps/core.xml" ContentType="application/vnd.openxmlformats-package.core-properties+xml"/>
    <Override PartName="/docProps/app.xml" ContentType="application/vnd.openxmlformats-officedocument.extended-properties+xml"/>
{slides}
</Types>"#,
        header = XML_HEADER,
        defaults = defaults,
        pml = pml,
        slides = slides
    )
}

fn app_xml(slide_count: usize) -> String {
    format!(
        r#"{}
<Properties xmlns="http://schemas.openxmlformats.org/officeDocument/2006/extended-properties" xmlns:vt="http://schemas.openxmlformats.org/officeDocument/2006/docPropsVTypes">
    <Application>{}</Application>
    <TotalTime>0</TotalTime>
    <Slides>{}</Slides>
</Properties>"#,
        XML_HEADER, APPLICATION, slide_count
    )
}

fn core_xml(presentation: &Presentation) -> String {
    let metadata = presentation.metadata();
    let now = chrono::Utc::now().format("%Y-%m-%dT%H:%M:%SZ");
    let author = xml_text(&metadata.author);
    format!(
        r#"{header}
<cp:coreProperties xmlns:cp="http://schemas.openxmlformats.org/package/2006/metadata/core-properties" xmlns:dc="http://purl.org/dc/elements/1.1/" xmlns:dcterms="http://purl.org/dc/terms/" xmlns:dcmitype="http://purl.org/dc/dcmitype/" xmlns:xsi="http://www.w3.org/2001/XMLSchema-instance">
    <dc:title>{title}</dc:title>
    <dc:creator>{author}</dc:creator>
    <cp:lastModifiedBy>{author}</cp:lastModifiedBy>
    <cp:revision>1</cp:revision>
    <dcterms:created xsi:type="dcterms:W3CDTF">{now}</dcterms:created>
    <dcterms:modified xsi:type="dcterms:W3CDTF">{now}</dcterms:modified>
</cp:coreProperties>"#,
        header = XML_HEADER,
        title = xml_text(&metadata.title),
        author = author,
        now = now
    )
}

/// rId1 is the master, slides follow, then the shared parts.
fn presentation_rels_xml(slide_count: usize) -> String {
    let mut entries: Vec<(String, &str, String)> = vec![(
        "rId1".to_string(),
        "slideMaster",
        "slideMasters/slideMaster1.xml".to_string(),
    )];
    for i in 1..=slide_count {
        entries.push((format!("rId{}", i + 1), "slide", format!("slides/slide{}.xml", i)));
    }
    let next = slide_count + 2;
    for (offset, (kind, target)) in [
        ("theme", "theme/theme1.xml"),
        ("presProps", "presProps.xml"),
        ("viewProps", "viewProps.xml"),
        ("tableStyles", "tableStyles.xml"),
    ]
    .into_iter()
    .enumerate()
    {
        entries.push((format!("rId{}", next + offset), kind, target.to_string()));
    }
    let borrowed: Vec<(&str, &str, &str)> = entries
        .iter()
        .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
        .collect();
    relationships(&borrowed)
}

fn presentation_xml(presentation: &Presentation) -> String {
    let layout = presentation.layout();
    let (cx, cy) = layout.size_emu();
    let slide_ids = (0..presentation.slide_count())
        .map(|i| format!(r#"        <p:sldId id="{}" r:id="rId{}"/>"#, 256 + i, i + 2))
        .collect::<Vec<String>>()
        .join("\n");
    let slide_id_list = if slide_ids.is_empty() {
        String::new()
    } else {
        format!("    <p:sldIdLst>\n{}\n    </p:sldIdLst>\n", slide_ids)
    };
    let size_type = match layout.pptx_size_type() {
        "custom" => String::new(),
        other => format!(r#" type="{}""#, other),
    };
    format!(
        r#"{header}
<p:presentation {ns} saveSubsetFonts="1">
    <p:sldMasterIdLst>
        <p:sldMasterId id="2147483648" r:id="rId1"/>
    </p:sldMasterIdLst>
{slide_id_list}    <p:sldSz cx="{cx}" cy="{cy}"{size_type}/>
    <p:notesSz cx="6858000" cy="9144000"/>
</p:presentation>"#,
        header = XML_HEADER,
        ns = NS_DECL,
        slide_id_list = slide_id_list,
        cx = cx,
        cy = cy,
        size_type = size_type
    )
}

fn view_props_xml() -> String {
    format!(
        r#"{}
<p:viewPr {}>
    <p:normalViewPr><p:restoredLeft sz="15620"/><p:restoredTop sz="94660"/></p:normalViewPr>
    <p:gridSpacing cx="76200" cy="76200"/>
</p:viewPr>"#,
        XML_HEADER, NS_DECL
    )
}

const TABLE_STYLES: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:tblStyleLst xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" def="{5C22544A-7EE6-4342-B048-85BDC9FD1C3A}"/>"#;

const EMPTY_GROUP: &str = r#"<p:nvGrpSpPr><p:cNvPr id="1" name=""/><p:cNvGrpSpPr/><p:nvPr/></p:nvGrpSpPr><p:grpSpPr><a:xfrm><a:off x="0" y="0"/><a:ext cx="0" cy="0"/><a:chOff x="0" y="0"/><a:chExt cx="0" cy="0"/></a:xfrm></p:grpSpPr>"#;

fn slide_master_xml() -> String {
    format!(
        r#"{header}
<p:sldMaster {ns}>
    <p:cSld>
        <p:bg><p:bgRef idx="1001"><a:schemeClr val="bg1"/></p:bgRef></p:bg>
        <p:spTree>{group}</p:spTree>
    </p:cSld>
    <p:clrMap bg1="lt1" tx1="dk1" bg2="lt2" tx2="dk2" accent1="accent1" accent2="accent2" accent3="accent3" accent4="accent4" accent5="accent5" accent6="accent6" hlink="hlink" folHlink="folHlink"/>
    <p:sldLayoutIdLst>
        <p:sldLayoutId id="2147483649" r:id="rId1"/>
    </p:sldLayoutIdLst>
    <p:txStyles>
        <p:titleStyle><a:lvl1pPr algn="l"><a:defRPr sz="4400" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mj-lt"/></a:defRPr></a:lvl1pPr></p:titleStyle>
        <p:bodyStyle><a:lvl1pPr marL="0" indent="0"><a:defRPr sz="1800" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/></a:defRPr></a:lvl1pPr></p:bodyStyle>
        <p:otherStyle><a:lvl1pPr><a:defRPr sz="1800" kern="1200"><a:solidFill><a:schemeClr val="tx1"/></a:solidFill><a:latin typeface="+mn-lt"/></a:defRPr></a:lvl1pPr></p:otherStyle>
    </p:txStyles>
</p:sldMaster>"#,
        header = XML_HEADER,
        ns = NS_DECL,
        group = EMPTY_GROUP
    )
}

fn slide_layout_xml() -> String {
    format!(
        r#"{header}
<p:sldLayout {ns} type="blank" preserve="1">
    <p:cSld name="Blank">
        <p:spTree>{group}</p:spTree>
    </p:cSld>
    <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>
</p:sldLayout>"#,
        header = XML_HEADER,
        ns = NS_DECL,
        group = EMPTY_GROUP
    )
}

const THEME: &str = r#"<?xml version="1.0" encoding="UTF-8" standalone="yes"?>
<a:theme xmlns:a="http://schemas.openxmlformats.org/drawingml/2006/main" name="Office Theme">
    <a:themeElements>
        <a:clrScheme name="Office">
            <a:dk1><a:sysClr val="windowText" lastClr="000000"/></a:dk1>
            <a:lt1><a:sysClr val="window" lastClr="FFFFFF"/></a:lt1>
            <a:dk2><a:srgbClr val="44546A"/></a:dk2>
            <a:lt2><a:srgbClr val="E7E6E6"/></a:lt2>
            <a:accent1><a:srgbClr val="4472C4"/></a:accent1>
            <a:accent2><a:srgbClr val="ED7D31"/></a:accent2>
            <a:accent3><a:srgbClr val="A5A5A5"/></a:accent3>
            <a:accent4><a:srgbClr val="FFC000"/></a:accent4>
            <a:accent5><a:srgbClr val="5B9BD5"/></a:accent5>
            <a:accent6><a:srgbClr val="70AD47"/></a:accent6>
            <a:hlink><a:srgbClr val="0563C1"/></a:hlink>
            <a:folHlink><a:srgbClr val="954F72"/></a:folHlink>
        </a:clrScheme>
        <a:fontScheme name="Office">
            <a:majorFont><a:latin typeface="Calibri Light"/><a:ea typeface=""/><a:cs typeface=""/></a:majorFont>
            <a:minorFont><a:latin typeface="Calibri"/><a:ea typeface=""/><a:cs typeface=""/></a:minorFont>
        </a:fontScheme>
        <a:fmtScheme name="Office">
            <a:fillStyleLst>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
            </a:fillStyleLst>
            <a:lnStyleLst>
                <a:ln w="6350"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
                <a:ln w="12700"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
                <a:ln w="19050"><a:solidFill><a:schemeClr val="phClr"/></a:solidFill></a:ln>
            </a:lnStyleLst>
            <a:effectStyleLst>
                <a:effectStyle><a:effectLst/></a:effectStyle>
                <a:effectStyle><a:effectLst/></a:effectStyle>
                <a:effectStyle><a:effectLst/></a:effectStyle>
            </a:effectStyleLst>
            <a:bgFillStyleLst>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
                <a:solidFill><a:schemeClr val="phClr"/></a:solidFill>
            </a:bgFillStyleLst>
        </a:fmtScheme>
    </a:themeElements>
    <a:objectDefaults/>
    <a:extraClrSchemeLst/>
</a:theme>"#;

/// Images referenced by one slide and their relationship ids.
struct SlideMedia<'a, 'c> {
    counter: &'c mut usize,
    images: Vec<(String, &'a ImageData)>,
}

impl<'a, 'c> SlideMedia<'a, 'c> {
    fn new(counter: &'c mut usize) -> Self {
        Self {
            counter,
            images: Vec::new(),
        }
    }

    /// Register an image and return its relationship id. rId1 is the layout.
    fn add(&mut self, image: &'a ImageData) -> String {
        *self.counter += 1;
        let name = format!("image{}.{}", self.counter, image.kind.extension());
        self.images.push((name, image));
        format!("rId{}", self.images.len() + 1)
    }

    fn rels_xml(&self) -> String {
        let mut entries = vec![(
            "rId1".to_string(),
            "slideLayout",
            "../slideLayouts/slideLayout1.xml".to_string(),
        )];
        for (i, (name, _)) in self.images.iter().enumerate() {
            entries.push((format!("rId{}", i + 2), "image", format!("../media/{}", name)));
        }
        let borrowed: Vec<(&str, &str, &str)> = entries
            .iter()
            .map(|(id, kind, target)| (id.as_str(), *kind, target.as_str()))
            .collect();
        relationships(&borrowed)
    }
}

fn slide_xml<'a>(slide: &'a SlideSpec, media: &mut SlideMedia<'a, '_>) -> String {
    let background = match &slide.background {
        Some(Background::Color(color)) => format!(
            r#"<p:bg><p:bgPr><a:solidFill><a:srgbClr val="{}"/></a:solidFill><a:effectLst/></p:bgPr></p:bg>"#,
            color.hex()
        ),
        Some(Background::Image(image)) => {
            let rid = media.add(image);
            format!(
                r#"<p:bg><p:bgPr><a:blipFill dpi="0" rotWithShape="1"><a:blip r:embed="{}"/><a:srcRect/><a:stretch><a:fillRect/></a:stretch></a:blipFill><a:effectLst/></p:bgPr></p:bg>"#,
                rid
            )
        }
        None => String::new(),
    };

    let mut shapes = String::new();
    for (i, element) in slide.elements.iter().enumerate() {
        let id = i as u32 + 2;
        let clamped = emu_frame(element.frame());
        match element {
            SlideElement::Text(text) => shapes.push_str(&text_box_xml(id, text, clamped)),
            SlideElement::Shape(shape) => shapes.push_str(&shape_xml(id, shape, clamped)),
            SlideElement::Picture(picture) => {
                let rid = media.add(&picture.image);
                shapes.push_str(&picture_xml(id, picture, &rid, clamped));
            }
        }
    }

    format!(
        r#"{header}
<p:sld {ns}>
    <p:cSld>{background}<p:spTree>{group}{shapes}</p:spTree></p:cSld>
    <p:clrMapOvr><a:masterClrMapping/></p:clrMapOvr>
</p:sld>"#,
        header = XML_HEADER,
        ns = NS_DECL,
        background = background,
        group = EMPTY_GROUP,
        shapes = shapes
    )
}

/// Offsets and extents in EMUs; negative sizes collapse to zero.
fn emu_frame(frame: Frame) -> (i64, i64, i64, i64) {
    (
        inches_to_emu(frame.x),
        inches_to_emu(frame.y),
        inches_to_emu(frame.w).max(0),
        inches_to_emu(frame.h).max(0),
    )
}

fn xfrm((x, y, cx, cy): (i64, i64, i64, i64)) -> String {
    format!(
        r#"<a:xfrm><a:off x="{}" y="{}"/><a:ext cx="{}" cy="{}"/></a:xfrm>"#,
        x, y, cx, cy
    )
}

fn solid_fill(color: &Color) -> String {
    format!(r#"<a:solidFill><a:srgbClr val="{}"/></a:solidFill>"#, color.hex())
}

fn text_box_xml(id: u32, text: &TextBox, frame: (i64, i64, i64, i64)) -> String {
    let paragraphs: String = text.paragraphs.iter().map(paragraph_xml).collect();
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Text {id}"/><p:cNvSpPr txBox="1"/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom><a:noFill/></p:spPr><p:txBody><a:bodyPr wrap="square" lIns="0" tIns="0" rIns="0" bIns="0" rtlCol="0" anchor="t"><a:noAutofit/></a:bodyPr><a:lstStyle/>{paragraphs}</p:txBody></p:sp>"#,
        id = id,
        xfrm = xfrm(frame),
        paragraphs = paragraphs
    )
}

fn paragraph_xml(paragraph: &Paragraph) -> String {
    let align = match paragraph.align {
        Align::Left => "l",
        Align::Center => "ctr",
        Align::Right => "r",
        Align::Justify => "just",
    };
    let spacing = paragraph
        .line_spacing_pt
        .map(|pt| format!(r#"<a:lnSpc><a:spcPts val="{}"/></a:lnSpc>"#, (pt * 100.0).round() as i64))
        .unwrap_or_default();
    let p_pr = match paragraph.bullet {
        Some(Bullet::Disc) => format!(
            r#"<a:pPr marL="285750" indent="-285750" algn="{}">{}<a:buFont typeface="Arial"/><a:buChar char="&#8226;"/></a:pPr>"#,
            align, spacing
        ),
        Some(Bullet::Numbered) => format!(
            r#"<a:pPr marL="342900" indent="-342900" algn="{}">{}<a:buFont typeface="+mj-lt"/><a:buAutoNum type="arabicPeriod"/></a:pPr>"#,
            align, spacing
        ),
        None => format!(r#"<a:pPr algn="{}">{}<a:buNone/></a:pPr>"#, align, spacing),
    };

    let mut body = String::new();
    for run in &paragraph.runs {
        let r_pr = run_properties(&run.style, "a:rPr");
        for (i, segment) in run.text.split('\n').enumerate() {
            if i > 0 {
                body.push_str(&format!("<a:br>{}</a:br>", r_pr));
            }
            if !segment.is_empty() {
                body.push_str(&format!("<a:r>{}<a:t>{}</a:t></a:r>", r_pr, xml_text(segment)));
            }
        }
    }
    let end_style = paragraph
        .runs
        .last()
        .map(|r| r.style.clone())
        .unwrap_or_default();
    format!(
        "<a:p>{}{}{}</a:p>",
        p_pr,
        body,
        run_properties(&end_style, "a:endParaRPr")
    )
}

fn run_properties(style: &RunStyle, tag: &str) -> String {
    let size = ((style.size_pt * 100.0).round() as i64).clamp(100, 400_000);
    let mut attrs = format!(r#" lang="en-US" sz="{}""#, size);
    if style.bold {
        attrs.push_str(r#" b="1""#);
    }
    if style.italic {
        attrs.push_str(r#" i="1""#);
    }
    if style.underline {
        attrs.push_str(r#" u="sng""#);
    }
    attrs.push_str(r#" dirty="0""#);

    let mut children = String::new();
    if let Some(color) = &style.color {
        children.push_str(&solid_fill(color));
    }
    if let Some(face) = &style.font_face {
        let face = xml_text(face);
        children.push_str(&format!(
            r#"<a:latin typeface="{0}"/><a:cs typeface="{0}"/>"#,
            face
        ));
    }
    if children.is_empty() {
        format!("<{}{}/>", tag, attrs)
    } else {
        format!("<{0}{1}>{2}</{0}>", tag, attrs, children)
    }
}

fn shape_xml(id: u32, shape: &ShapeBox, frame: (i64, i64, i64, i64)) -> String {
    let geometry = match shape.geometry {
        Geometry::Rect => "rect",
        Geometry::RoundRect => "roundRect",
    };
    let fill = shape
        .fill
        .as_ref()
        .map(solid_fill)
        .unwrap_or_else(|| "<a:noFill/>".to_string());
    let line = match &shape.line {
        Some(stroke) => format!(
            r#"<a:ln w="{}">{}</a:ln>"#,
            (stroke.width_pt * 12_700.0).round() as i64,
            solid_fill(&stroke.color)
        ),
        None => "<a:ln><a:noFill/></a:ln>".to_string(),
    };
    format!(
        r#"<p:sp><p:nvSpPr><p:cNvPr id="{id}" name="Shape {id}"/><p:cNvSpPr/><p:nvPr/></p:nvSpPr><p:spPr>{xfrm}<a:prstGeom prst="{geometry}"><a:avLst/></a:prstGeom>{fill}{line}</p:spPr></p:sp>"#,
        id = id,
        xfrm = xfrm(frame),
        geometry = geometry,
        fill = fill,
        line = line
    )
}

fn picture_xml(id: u32, picture: &Picture, rid: &str, frame: (i64, i64, i64, i64)) -> String {
    format!(
        r#"<p:pic><p:nvPicPr><p:cNvPr id="{id}" name="Picture {id}" descr="{descr}"/><p:cNvPicPr><a:picLocks noChangeAspect="1"/></p:cNvPicPr><p:nvPr/></p:nvPicPr><p:blipFill><a:blip r:embed="{rid}"/><a:stretch><a:fillRect/></a:stretch></p:blipFill><p:spPr>{xfrm}<a:prstGeom prst="rect"><a:avLst/></a:prstGeom></p:spPr></p:pic>"#,
        id = id,
        descr = xml_text(&picture.description),
        rid = rid,
        xfrm = xfrm(frame)
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::layout::LayoutPreset;
    use crate::slide::{DeckMetadata, TextRun};
    use std::io::{Cursor, Read};
    use zip::ZipArchive;

    fn text_slide(text: &str) -> SlideSpec {
        SlideSpec {
            background: Some(Background::Color(Color::rgb(0x10, 0x20, 0x30))),
            elements: vec![SlideElement::Text(TextBox {
                frame: Frame::new(0.5, 0.5, 9.0, 1.0),
                paragraphs: vec![Paragraph {
                    runs: vec![TextRun {
                        text: text.to_string(),
                        style: RunStyle {
                            bold: true,
                            ..RunStyle::default()
                        },
                    }],
                    ..Paragraph::default()
                }],
            })],
            placeholders: Vec::new(),
        }
    }

    fn read_part(archive: &mut ZipArchive<Cursor<Vec<u8>>>, name: &str) -> String {
        let mut content = String::new();
        archive
            .by_name(name)
            .expect("part missing")
            .read_to_string(&mut content)
            .expect("part not utf-8");
        content
    }

    #[test]
    fn test_package_parts_and_metadata() {
        let mut deck = Presentation::new(DeckMetadata {
            layout: LayoutPreset::Standard4x3,
            author: "Ada & Co".to_string(),
            title: "Q3 <Review>".to_string(),
        });
        deck.push_slide(text_slide("First"));
        deck.push_slide(text_slide("Second\nline"));

        let cursor = write_pptx(&deck, Cursor::new(Vec::new())).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();

        let core = read_part(&mut archive, "docProps/core.xml");
        assert!(core.contains("<dc:creator>Ada &amp; Co</dc:creator>"));
        assert!(core.contains("<dc:title>Q3 &lt;Review&gt;</dc:title>"));

        let presentation = read_part(&mut archive, "ppt/presentation.xml");
        assert!(presentation.contains(r#"<p:sldSz cx="9144000" cy="6858000" type="screen4x3"/>"#));
        assert!(presentation.contains(r#"<p:sldId id="257" r:id="rId3"/>"#));

        let rels = read_part(&mut archive, "ppt/_rels/presentation.xml.rels");
        assert!(rels.contains(r#"Id="rId3" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/slide" Target="slides/slide2.xml""#));
        assert!(rels.contains(r#"Id="rId4" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/theme""#));

        let slide2 = read_part(&mut archive, "ppt/slides/slide2.xml");
        assert!(slide2.contains("<a:t>Second</a:t></a:r><a:br>"));
        assert!(slide2.contains(r#"<a:srgbClr val="102030"/>"#));
        assert!(slide2.contains(r#" b="1""#));
        assert!(archive.by_name("ppt/slideMasters/slideMaster1.xml").is_ok());
        assert!(archive.by_name("ppt/theme/theme1.xml").is_ok());
    }

    #[test]
    fn test_images_are_numbered_across_slides() {
        let png = {
            let img = image::RgbImage::from_pixel(4, 2, image::Rgb([200, 10, 10]));
            let mut bytes = Cursor::new(Vec::new());
            image::DynamicImage::ImageRgb8(img)
                .write_to(&mut bytes, image::ImageOutputFormat::Png)
                .unwrap();
            ImageData::from_bytes(bytes.into_inner()).unwrap()
        };
        let picture = |x: f64| {
            SlideElement::Picture(Picture {
                frame: Frame::new(x, 1.0, 2.0, 1.0),
                image: png.clone(),
                description: "chart".to_string(),
            })
        };
        let mut deck = Presentation::new(DeckMetadata::default());
        deck.push_slide(SlideSpec {
            elements: vec![picture(0.5), picture(3.0)],
            ..SlideSpec::default()
        });
        deck.push_slide(SlideSpec {
            background: Some(Background::Image(png.clone())),
            ..SlideSpec::default()
        });

        let cursor = write_pptx(&deck, Cursor::new(Vec::new())).unwrap();
        let mut archive = ZipArchive::new(Cursor::new(cursor.into_inner())).unwrap();
        for name in ["ppt/media/image1.png", "ppt/media/image2.png", "ppt/media/image3.png"] {
            assert!(archive.by_name(name).is_ok(), "{} missing", name);
        }
        let rels = read_part(&mut archive, "ppt/slides/_rels/slide2.xml.rels");
        assert!(rels.contains(r#"Id="rId2" Type="http://schemas.openxmlformats.org/officeDocument/2006/relationships/image" Target="../media/image3.png""#));
        let slide1 = read_part(&mut archive, "ppt/slides/slide1.xml");
        assert!(slide1.contains(r#"<a:blip r:embed="rId3"/>"#));
    }

    #[test]
    fn test_save_reports_write_failure_and_leaves_nothing() {
        let dir = tempfile::TempDir::new().unwrap();
        let blocker = dir.path().join("blocker");
        fs::write(&blocker, "not a directory").unwrap();
        let output = blocker.join("deck.pptx");

        let mut deck = Presentation::new(DeckMetadata::default());
        deck.push_slide(text_slide("Only"));
        match save_pptx(&deck, &output) {
            Err(DeckError::WriteFailed { path, .. }) => assert_eq!(path, output),
            other => panic!("expected write failure, got {:?}", other),
        }
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }

    #[test]
    fn test_save_replaces_existing_output() {
        let dir = tempfile::TempDir::new().unwrap();
        let output = dir.path().join("deck.pptx");
        fs::write(&output, "stale").unwrap();

        let mut deck = Presentation::new(DeckMetadata::default());
        deck.push_slide(text_slide("Fresh"));
        save_pptx(&deck, &output).unwrap();

        let mut archive = ZipArchive::new(Cursor::new(fs::read(&output).unwrap())).unwrap();
        assert!(read_part(&mut archive, "ppt/slides/slide1.xml").contains("Fresh"));
        assert_eq!(fs::read_dir(dir.path()).unwrap().count(), 1);
    }
}
